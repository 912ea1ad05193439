/// Protocol version (first byte of every frame header).
pub const PROTO_VERSION: u8 = 1;

/// Header length: ver(1) + type(1) + flags(2) + body_len(4).
pub const HEADER_LEN: usize = 8;

/// Default upper bound on a frame body, to avoid OOM on hostile peers.
pub const MAX_BODY_LEN: usize = 1_048_576; // 1 MiB
