use std::io;
use std::sync::Arc;

use crate::log::LogSink;
use crate::signaling::signaling_server::{ServerSettings, SignalingServer};

/// Run the relay with the given settings and log sink. Blocks.
pub fn run_signaling_server_with_log(
    settings: ServerSettings,
    log_sink: Arc<dyn LogSink>,
) -> io::Result<()> {
    SignalingServer::new(settings, log_sink).run()
}
