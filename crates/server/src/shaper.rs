//! Download throughput shaping.
//!
//! Content streams are paced cooperatively: after each chunk the shaper
//! compares bytes sent against the elapsed wall clock and sleeps off any
//! surplus. No chunk is dropped and no buffer grows; a download of N bytes
//! at rate R takes at least N/R seconds.

use futures::StreamExt;
use satchel_storage::ByteStream;
use std::time::Duration;
use tokio::time::Instant;

/// Wrap a byte stream so it delivers at most `bytes_per_sec`. A rate of 0
/// disables shaping.
pub fn throttle(stream: ByteStream, bytes_per_sec: u64) -> ByteStream {
    if bytes_per_sec == 0 {
        return stream;
    }

    let shaped = async_stream::try_stream! {
        let started = Instant::now();
        let mut sent: u64 = 0;
        let mut stream = stream;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sent += chunk.len() as u64;

            // Sleep until the wall clock catches up with the byte budget.
            let expected = Duration::from_secs_f64(sent as f64 / bytes_per_sec as f64);
            let elapsed = started.elapsed();
            if expected > elapsed {
                tokio::time::sleep(expected - elapsed).await;
            }

            yield chunk;
        }
    };

    Box::pin(shaped)
}
