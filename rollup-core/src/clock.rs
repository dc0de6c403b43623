use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::{fmt::Debug, time::Duration};

/// Time source for the driver, swappable in tests.
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date stamped on stored summaries.
    fn today(&self) -> NaiveDate;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
