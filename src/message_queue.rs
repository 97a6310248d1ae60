/*!
 * Webhook job queue.
 *
 * The webhook HTTP handler must acknowledge deliveries quickly and
 * independently of processing time, so payloads are handed to a bounded
 * queue and drained by a worker loop. Each job is processed in its own
 * task: deliveries for different users run concurrently, while one payload
 * is always handled start-to-finish by a single task.
 */

use crate::{chatbot::processor::WebhookProcessor, errors::ServiceError, models::WebhookPayload};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Envelope for a queued webhook delivery
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub id: Uuid,
    pub payload: WebhookPayload,
    pub received_at: DateTime<Utc>,
}

impl WebhookJob {
    pub fn new(payload: WebhookPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Producer half, held by the webhook handler
#[derive(Clone)]
pub struct WebhookQueue {
    sender: mpsc::Sender<WebhookJob>,
}

impl WebhookQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WebhookJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Non-blocking enqueue; a full queue is an error rather than a stall
    /// of the HTTP handler.
    pub fn enqueue(&self, payload: WebhookPayload) -> Result<(), ServiceError> {
        let job = WebhookJob::new(payload);
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                error!(job_id = %job.id, "Webhook queue is full, dropping delivery");
                ServiceError::QueueError("webhook queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(job) => {
                error!(job_id = %job.id, "Webhook queue is closed");
                ServiceError::QueueError("webhook queue is closed".to_string())
            }
        })
    }
}

/// Drains the queue for the lifetime of the process. Jobs run in spawned
/// tasks; a panicking or failing job never takes the loop down.
pub async fn run_worker(mut receiver: mpsc::Receiver<WebhookJob>, processor: WebhookProcessor) {
    info!("Webhook queue worker started");

    while let Some(job) = receiver.recv().await {
        let processor = processor.clone();
        tokio::spawn(async move {
            let job_id = job.id;
            info!(%job_id, "Processing webhook job");
            processor.process(job.payload).await;
        });
    }

    warn!("Webhook queue worker stopped: all producers dropped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_payload() -> WebhookPayload {
        serde_json::from_str(r#"{"entry": []}"#).unwrap()
    }

    #[tokio::test]
    async fn enqueued_jobs_are_received_in_order() {
        let (queue, mut rx) = WebhookQueue::new(8);

        queue.enqueue(empty_payload()).unwrap();
        queue.enqueue(empty_payload()).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.received_at <= second.received_at);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn full_queue_reports_queue_error() {
        let (queue, _rx) = WebhookQueue::new(1);

        queue.enqueue(empty_payload()).unwrap();
        let err = queue.enqueue(empty_payload()).unwrap_err();
        assert!(matches!(err, ServiceError::QueueError(_)));
    }

    #[tokio::test]
    async fn closed_queue_reports_queue_error() {
        let (queue, rx) = WebhookQueue::new(1);
        drop(rx);

        let err = queue.enqueue(empty_payload()).unwrap_err();
        assert!(matches!(err, ServiceError::QueueError(_)));
    }
}
