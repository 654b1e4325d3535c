//! AWS CloudWatch Logs backend.
//!
//! Credentials come from the default AWS provider chain
//! (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, profile, instance role...).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::config::Region;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudwatchlogs::operation::create_log_group::CreateLogGroupError;
use aws_sdk_cloudwatchlogs::operation::create_log_stream::CreateLogStreamError;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use tracing::{info, instrument};

use super::sink::{LogSink, SinkError};

pub struct CloudWatchSink {
    client: Client,
}

impl CloudWatchSink {
    /// Load AWS configuration for `region` and build a client.
    #[instrument]
    pub async fn new(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        info!("CloudWatch Logs client configured");

        Self {
            client: Client::new(&sdk_config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogSink for CloudWatchSink {
    async fn create_log_group(&self, group: &str) -> Result<(), SinkError> {
        match self
            .client
            .create_log_group()
            .log_group_name(group)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(sink_error(
                &e,
                CreateLogGroupError::is_resource_already_exists_exception,
            )),
        }
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(sink_error(
                &e,
                CreateLogStreamError::is_resource_already_exists_exception,
            )),
        }
    }

    async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        timestamp_ms: i64,
        message: &str,
    ) -> Result<(), SinkError> {
        let event = InputLogEvent::builder()
            .timestamp(timestamp_ms)
            .message(message)
            .build()
            .map_err(|e| SinkError::Other(e.to_string()))?;

        self.client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .log_events(event)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sink_error(&e, |_| false))
    }
}

/// Map an SDK failure, keeping the full cause chain (dispatch, timeout,
/// service error) in the message.
fn sink_error<E, R>(error: &SdkError<E, R>, already_exists: impl Fn(&E) -> bool) -> SinkError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if error.as_service_error().is_some_and(already_exists) {
        SinkError::AlreadyExists
    } else {
        SinkError::Other(DisplayErrorContext(error).to_string())
    }
}
