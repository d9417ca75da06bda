pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const POW_TARGET_DIFFICULTY: usize = 4;
pub const MAX_DIFFICULTY: usize = HASH_HEX_SIZE;
pub const RANDOM_DATA_LEN: usize = 30;
pub const CHAIN_DUMP_INTERVAL: u64 = 10;
/// Previous-hash value carried by every genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
