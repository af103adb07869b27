/// Generates globally unique proposer round IDs.
///
/// Participant `i` of `n` uses rounds `i`, `i + n`, `i + 2n`, ... so no
/// two proposers can ever collide on a round.
#[derive(Debug)]
pub struct RoundIdGenerator {
    node_index: u64,
    num_participants: u64,
    attempt: u64,
}

impl RoundIdGenerator {
    pub fn new(node_index: u64, num_participants: u64) -> Self {
        RoundIdGenerator {
            node_index,
            num_participants,
            attempt: 0,
        }
    }

    pub fn next(&mut self) -> u64 {
        let round = self.node_index + self.attempt * self.num_participants;
        self.attempt += 1;
        round
    }
}
