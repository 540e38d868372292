use futures::future::try_join_all;
use log::info;
use wavefront::{FarmConfig, SquareMtx};

use crate::{
    LocalFabric, Rank,
    error::{RankErr, Result},
    layout::Layout,
};

/// Runs every rank of `layout` as a task of the current runtime, linked by a `LocalFabric`.
///
/// # Arguments
/// * `layout` - How the matrix is spread over the ranks.
/// * `farm` - The configuration of every local farm.
///
/// # Returns
/// The root's matrix or the first failure of any rank.
pub async fn run_mesh(layout: Layout, farm: FarmConfig) -> Result<SquareMtx> {
    info!(
        "running {} ranks in process over a matrix of length {}",
        layout.ranks(),
        layout.len()
    );

    let handles = LocalFabric::mesh(layout.ranks()).into_iter().map(|fabric| {
        let rank = Rank::new(layout, farm, fabric);
        tokio::spawn(async move { rank?.run().await })
    });

    let results = try_join_all(handles.map(|handle| async move { handle.await? })).await?;

    results
        .into_iter()
        .flatten()
        .next()
        .ok_or(RankErr::MissingRoot)
}
