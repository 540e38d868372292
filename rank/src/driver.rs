use std::{borrow::Cow, ops::Range, time::Instant};

use comms::msg::{Msg, Payload};
use log::{debug, info, warn};
use tokio::task;
use wavefront::{Farm, FarmConfig, FarmReport, SquareMtx};

use crate::{
    Fabric,
    error::{RankErr, Result},
    layout::{Layout, Role, Round},
};

/// One rank of a distributed run.
///
/// Every round the rank computes its block with a local farm, then either
/// hands it to its branch and exits or absorbs its leaves' blocks and goes on
/// with the merged block. The last rank standing holds the whole matrix.
pub struct Rank<F> {
    rank: usize,
    layout: Layout,
    farm: FarmConfig,
    fabric: F,
}

impl<F: Fabric> Rank<F> {
    /// Creates a new `Rank`.
    ///
    /// # Arguments
    /// * `layout` - How the matrix is spread over the ranks.
    /// * `farm` - The configuration of every local farm.
    /// * `fabric` - This rank's links to its peers, its rank is taken from it.
    ///
    /// # Returns
    /// The rank or `RankErr::UnknownRank` if the fabric's rank isn't part of the layout.
    pub fn new(layout: Layout, farm: FarmConfig, fabric: F) -> Result<Self> {
        let rank = fabric.rank();
        if rank >= layout.ranks() {
            return Err(RankErr::UnknownRank {
                rank,
                ranks: layout.ranks(),
            });
        }

        Ok(Self {
            rank,
            layout,
            farm,
            fabric,
        })
    }

    /// Runs every round this rank takes part in.
    ///
    /// # Returns
    /// The whole matrix on the root rank, `None` everywhere else.
    pub async fn run(self) -> Result<Option<SquareMtx>> {
        let start = Instant::now();
        let mut round = self.layout.first_round();
        let rows = self.layout.rows(round, round.id(self.rank));

        let mut mtx = SquareMtx::with_origin(rows.len(), rows.start, self.layout.len());
        let mut settled = Vec::new();

        loop {
            let role = round.role(self.rank);

            let (computed, report) = match self.compute(mtx, settled).await {
                Ok(done) => done,
                Err(e) => {
                    if let Role::Leaf { branch } = role {
                        self.report_failure(branch, &e).await;
                    }
                    return Err(e);
                }
            };
            mtx = computed;

            info!(
                "rank {} computed rows {:?} in round {} ({} cells, {:?})",
                self.rank,
                mtx.rows(),
                round.number(),
                report.written,
                report.elapsed
            );

            match role {
                Role::Root => {
                    info!("rank {} holds the matrix after {:?}", self.rank, start.elapsed());
                    return Ok(Some(mtx));
                }
                Role::Leaf { branch } => {
                    self.send_block(branch, round, &mtx).await?;
                    return Ok(None);
                }
                Role::Branch { first, second } => {
                    let next = round.next();
                    let merged = self.layout.rows(next, next.id(self.rank));
                    let mut grown = mtx.extended(merged.len());

                    settled = vec![local(&merged, mtx.rows())];
                    for leaf in [Some(first), second].into_iter().flatten() {
                        let rows = self.layout.rows(round, round.id(leaf));
                        self.recv_block(leaf, round, rows.clone(), &mut grown).await?;
                        settled.push(local(&merged, rows));
                    }

                    mtx = grown;
                    round = next;
                }
                Role::Retired => {
                    return Err(RankErr::UnknownRank {
                        rank: self.rank,
                        ranks: round.active(),
                    });
                }
            }
        }
    }

    /// Runs the local farm on the blocking pool.
    async fn compute(
        &self,
        mut mtx: SquareMtx,
        settled: Vec<Range<usize>>,
    ) -> Result<(SquareMtx, FarmReport)> {
        let farm = Farm::new(self.farm);

        let (mtx, report) = task::spawn_blocking(move || {
            let report = farm.run_settled(&mut mtx, &settled);
            (mtx, report)
        })
        .await?;

        Ok((mtx, report?))
    }

    async fn send_block(&self, branch: usize, round: Round, mtx: &SquareMtx) -> Result<()> {
        let mut tx = self.fabric.open(branch).await?;

        let msg = Msg::Data(Payload::Block {
            round: round.number(),
            origin: mtx.origin() as u64,
            len: mtx.len() as u64,
            cells: mtx.as_slice(),
        });
        tx.send(&msg).await?;
        tx.shutdown().await?;

        debug!(
            "rank {} sent rows {:?} to rank {branch}",
            self.rank,
            mtx.rows()
        );
        Ok(())
    }

    /// Receives the block of `leaf` and embeds it into `target`.
    async fn recv_block(
        &self,
        leaf: usize,
        round: Round,
        expected: Range<usize>,
        target: &mut SquareMtx,
    ) -> Result<()> {
        let mut rx = self.fabric.accept(leaf).await?;
        let mut buf: Vec<u64> = Vec::new();

        let msg: Msg = rx.recv_into(&mut buf).await?;
        match msg {
            Msg::Data(Payload::Block {
                round: got_round,
                origin,
                len,
                cells,
            }) => {
                let (origin, len) = (origin as usize, len as usize);
                let got = origin..origin + len;

                if got_round != round.number() || got != expected {
                    return Err(RankErr::BlockMismatch {
                        from: leaf,
                        round: round.number(),
                        expected,
                        got_round,
                        got,
                    });
                }

                target.embed_cells(origin, len, cells);
                debug!("rank {} absorbed rows {got:?} of rank {leaf}", self.rank);
                Ok(())
            }
            Msg::Err(reason) => Err(RankErr::PeerFailed {
                peer: leaf,
                reason: reason.into_owned(),
            }),
            other => Err(RankErr::UnexpectedMessage {
                from: leaf,
                got: other.kind(),
            }),
        }
    }

    /// Tells the branch this rank won't send its block, so it doesn't wait forever.
    async fn report_failure(&self, branch: usize, e: &RankErr) {
        let reason = e.to_string();
        let msg = Msg::Err(Cow::Borrowed(reason.as_str()));

        let sent = match self.fabric.open(branch).await {
            Ok(mut tx) => tx.send(&msg).await,
            Err(e) => Err(e),
        };

        if let Err(e) = sent {
            warn!("rank {} couldn't report its failure to rank {branch}: {e}", self.rank);
        }
    }
}

/// Translates global rows into indices local to `block`.
fn local(block: &Range<usize>, rows: Range<usize>) -> Range<usize> {
    rows.start - block.start..rows.end - block.start
}
