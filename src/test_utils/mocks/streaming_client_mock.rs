use std::time::Duration;

use crate::{async_trait, throw, Message, Result, StreamingClient as StreamingClientInterface};
use mockall::mock;

mock! {
    pub StreamingClient {}

    #[async_trait]
    impl StreamingClientInterface for StreamingClient {
        async fn send_sync(&self, message: Message, timeout: Duration) -> Result<bool>;
        async fn health_check(&self) -> Result<()>;
        fn flush(&self, timeout: Duration) -> Result<()>;
    }
}

impl MockStreamingClient {
    /// Expects one publish to `topic` with `key`, answering with `result`.
    pub fn send_sync(mut self, topic: &str, key: &str, result: Result<bool>) -> Self {
        let (topic, key) = (topic.to_string(), key.to_string());

        self.expect_send_sync()
            .times(1)
            .withf(move |message, _| message.topic == topic && message.key == key)
            .returning(move |_, _| match &result {
                Ok(acked) => Ok(*acked),
                Err(_) => Err(throw!("Publish error")),
            });

        self
    }

    /// Acknowledges every publish.
    pub fn acking(mut self) -> Self {
        self.expect_send_sync().returning(|_, _| Ok(true));
        self
    }

    pub fn health_check(mut self, result: Result<()>) -> Self {
        self.expect_health_check()
            .times(1)
            .returning(move || match &result {
                Ok(_) => Ok(()),
                Err(_) => Err(throw!("Health check error")),
            });

        self
    }

    pub fn flush(mut self) -> Self {
        self.expect_flush().times(1).returning(|_| Ok(()));
        self
    }
}
