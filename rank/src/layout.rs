use std::ops::Range;

use wavefront::{clamp_len, clamp_parallelism};

/// What a rank does at the end of a merge round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The last active rank, it holds the whole matrix.
    Root,
    /// Absorbs the blocks of `first` and, for the trailing pair of an odd
    /// round, of `second`. Both are physical ranks.
    Branch { first: usize, second: Option<usize> },
    /// Sends its block to the physical rank `branch` and exits.
    Leaf { branch: usize },
    /// Already merged into another rank.
    Retired,
}

/// One merge round of a run with `ranks` ranks, numbered from `1`.
///
/// In round `r` the logical id of a rank is `rank / 2^(r - 1)` and only
/// `ranks / 2^(r - 1)` of them are still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    ranks: usize,
    number: u32,
}

impl Round {
    pub fn first(ranks: usize) -> Self {
        Self { ranks, number: 1 }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn next(&self) -> Self {
        Self {
            ranks: self.ranks,
            number: self.number + 1,
        }
    }

    /// The amount of active ranks in this round.
    pub fn active(&self) -> usize {
        self.ranks >> self.shift()
    }

    /// The logical id of a physical rank.
    pub fn id(&self, rank: usize) -> usize {
        rank >> self.shift()
    }

    /// The physical rank behind a logical id.
    pub fn rank(&self, id: usize) -> usize {
        id << self.shift()
    }

    /// Computes the role of a physical rank in this round.
    pub fn role(&self, rank: usize) -> Role {
        let active = self.active();
        let id = self.id(rank);

        if id >= active || self.rank(id) != rank {
            return Role::Retired;
        }

        if active == 1 {
            return Role::Root;
        }

        if id % 2 == 0 && id + 1 < active {
            let second = (active % 2 == 1 && id + 2 == active - 1).then(|| self.rank(id + 2));
            return Role::Branch {
                first: self.rank(id + 1),
                second,
            };
        }

        // Odd ids pair with their left neighbour, the trailing even id of an
        // odd round joins the pair before it.
        let branch = if id % 2 == 1 { id - 1 } else { id - 2 };
        Role::Leaf {
            branch: self.rank(branch),
        }
    }

    fn shift(&self) -> u32 {
        self.number - 1
    }
}

/// How the rows of a `len` x `len` matrix are spread over `ranks` ranks.
///
/// Rank `q` starts out with rows `[min(q * s, len), min((q + 1) * s, len))`
/// where `s = ceil(len / ranks)`. Through the rounds a rank's block is the
/// union of the initial blocks of every rank it absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    len: usize,
    ranks: usize,
    base: usize,
}

impl Layout {
    /// Creates a new `Layout`, clamping both the length and the amount of ranks.
    ///
    /// # Arguments
    /// * `len` - The side length of the matrix.
    /// * `ranks` - The requested amount of ranks.
    pub fn new(len: usize, ranks: usize) -> Self {
        let len = clamp_len(len);
        let ranks = clamp_parallelism(ranks, len).get();

        Self {
            len,
            ranks,
            base: len.div_ceil(ranks),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    pub fn first_round(&self) -> Round {
        Round::first(self.ranks)
    }

    /// The amount of rounds until a single rank holds the matrix.
    pub fn rounds(&self) -> u32 {
        self.ranks.ilog2() + 1
    }

    /// The global rows held by a logical id in `round`.
    ///
    /// # Arguments
    /// * `round` - The merge round.
    /// * `id` - A logical id active in that round.
    pub fn rows(&self, round: Round, id: usize) -> Range<usize> {
        let start = self.initial_start(round.rank(id));
        let end = if id + 1 < round.active() {
            self.initial_start(round.rank(id + 1))
        } else {
            self.len
        };

        start..end
    }

    fn initial_start(&self, rank: usize) -> usize {
        (rank * self.base).min(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_ranks_merge_in_pairs() {
        let round = Round::first(4);
        assert_eq!(
            round.role(0),
            Role::Branch {
                first: 1,
                second: None
            }
        );
        assert_eq!(round.role(1), Role::Leaf { branch: 0 });
        assert_eq!(
            round.role(2),
            Role::Branch {
                first: 3,
                second: None
            }
        );
        assert_eq!(round.role(3), Role::Leaf { branch: 2 });

        let round = round.next();
        assert_eq!(round.active(), 2);
        assert_eq!(
            round.role(0),
            Role::Branch {
                first: 2,
                second: None
            }
        );
        assert_eq!(round.role(2), Role::Leaf { branch: 0 });
        assert_eq!(round.role(1), Role::Retired);
        assert_eq!(round.role(3), Role::Retired);

        let round = round.next();
        assert_eq!(round.role(0), Role::Root);
        assert_eq!(round.role(2), Role::Retired);
    }

    #[test]
    fn odd_round_gives_the_trailing_rank_to_the_last_pair() {
        let round = Round::first(5);

        assert_eq!(
            round.role(2),
            Role::Branch {
                first: 3,
                second: Some(4)
            }
        );
        assert_eq!(round.role(4), Role::Leaf { branch: 2 });
        assert_eq!(
            round.role(0),
            Role::Branch {
                first: 1,
                second: None
            }
        );

        let round = round.next();
        assert_eq!(round.active(), 2);
        assert_eq!(round.role(2), Role::Leaf { branch: 0 });
        assert_eq!(round.role(4), Role::Retired);
    }

    #[test]
    fn three_ranks_merge_at_once() {
        let round = Round::first(3);

        assert_eq!(
            round.role(0),
            Role::Branch {
                first: 1,
                second: Some(2)
            }
        );
        assert_eq!(round.next().role(0), Role::Root);
    }

    #[test]
    fn single_rank_is_root_right_away() {
        assert_eq!(Round::first(1).role(0), Role::Root);
        assert_eq!(Layout::new(10, 1).rounds(), 1);
    }

    #[test]
    fn every_rank_but_zero_leaves_exactly_once() {
        for ranks in 1..=17 {
            let layout = Layout::new(64, ranks);
            let mut round = layout.first_round();
            let mut absorbed = vec![0; ranks];
            let mut left = vec![0; ranks];

            for _ in 0..layout.rounds() {
                for rank in 0..ranks {
                    match round.role(rank) {
                        Role::Branch { first, second } => {
                            absorbed[first] += 1;
                            if let Some(second) = second {
                                absorbed[second] += 1;
                            }
                        }
                        Role::Leaf { .. } => left[rank] += 1,
                        _ => {}
                    }
                }
                round = round.next();
            }

            assert_eq!(absorbed, left, "{ranks} ranks");
            assert_eq!(absorbed[0], 0);
            assert!(absorbed[1..].iter().all(|&a| a == 1), "{ranks} ranks");
        }
    }

    #[test]
    fn initial_blocks_tile_the_matrix() {
        let layout = Layout::new(10, 4);
        let round = layout.first_round();
        let blocks: Vec<_> = (0..4).map(|q| layout.rows(round, q)).collect();

        assert_eq!(blocks, [0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn merged_block_is_the_union_of_its_parts() {
        for ranks in 1..=9 {
            let layout = Layout::new(23, ranks);
            let mut round = layout.first_round();

            for _ in 1..layout.rounds() {
                let next = round.next();
                for rank in 0..ranks {
                    if let Role::Branch { first, second } = round.role(rank) {
                        let merged = layout.rows(next, next.id(rank));
                        let last = second.unwrap_or(first);

                        assert_eq!(merged.start, layout.rows(round, round.id(rank)).start);
                        assert_eq!(merged.end, layout.rows(round, round.id(last)).end);
                    }
                }
                round = next;
            }

            assert_eq!(layout.rows(round, 0), 0..23);
        }
    }

    #[test]
    fn ranks_are_clamped_to_the_matrix() {
        let layout = Layout::new(3, 8);
        assert_eq!(layout.ranks(), 3);

        let layout = Layout::new(0, 0);
        assert_eq!((layout.len(), layout.ranks()), (1, 1));
    }
}
