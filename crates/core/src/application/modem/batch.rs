// Sequential batch send over one prepared session

use std::time::Duration;
use tracing::{info, warn};

use super::ModemSession;
use crate::domain::{BatchClassification, BatchReport, SmsSendOutcome};
use crate::port::ModemTransport;

const NOT_ATTEMPTED: &str = "not attempted: shutdown requested";

impl<T: ModemTransport> ModemSession<T> {
    /// Send `message` to every recipient in order
    ///
    /// `delay` separates consecutive recipients only. A shutdown request
    /// stops the batch; recipients not yet tried are reported undelivered.
    pub async fn send_batch(
        &mut self,
        recipients: &[String],
        message: &str,
        delay: Duration,
    ) -> BatchReport {
        let mut outcomes = Vec::with_capacity(recipients.len());
        let mut attempted = 0;
        let mut interrupted = false;

        for (index, recipient) in recipients.iter().enumerate() {
            if interrupted || self.shutdown.is_shutdown() {
                interrupted = true;
                outcomes.push(SmsSendOutcome::failed(recipient.as_str(), NOT_ATTEMPTED));
                continue;
            }

            attempted += 1;
            outcomes.push(self.send(recipient, message).await);

            if index + 1 < recipients.len() && !self.shutdown.sleep(delay).await {
                interrupted = true;
            }
        }

        let report = BatchReport {
            outcomes,
            attempted,
            interrupted,
        };
        if interrupted {
            warn!(
                attempted = report.attempted,
                total = report.total(),
                "Batch stopped by shutdown request"
            );
        }
        match report.classification() {
            BatchClassification::FullSuccess => {
                info!(delivered = report.delivered(), total = report.total(), "All messages sent")
            }
            BatchClassification::PartialSuccess => warn!(
                delivered = report.delivered(),
                total = report.total(),
                "Partial success"
            ),
            BatchClassification::TotalFailure => {
                warn!(total = report.total(), "No messages were sent successfully")
            }
        }
        report
    }
}
