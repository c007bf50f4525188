use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use maru_lock::registry::LockRegistry;

use crate::config::CommerceConfig;
use crate::infra::broker::{RedisStreamConsumer, RedisStreamPublisher};
use crate::infra::db::{
    DbConsumedEventStore, DbCouponStore, DbOrderStore, DbOutboxStore, DbPointStore,
};
use crate::infra::lock::RedisLockExecutor;
use crate::infra::queue::RedisIssuanceQueue;
use crate::outbox::service::OutboxService;

/// Shared application state handed to workers and usecases.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub registry: Arc<LockRegistry>,
    pub config: Arc<CommerceConfig>,
}

impl AppState {
    pub fn coupon_store(&self) -> DbCouponStore {
        DbCouponStore {
            db: self.db.clone(),
        }
    }

    pub fn order_store(&self) -> DbOrderStore {
        DbOrderStore {
            db: self.db.clone(),
        }
    }

    pub fn point_store(&self) -> DbPointStore {
        DbPointStore {
            db: self.db.clone(),
        }
    }

    pub fn outbox_store(&self) -> DbOutboxStore {
        DbOutboxStore {
            db: self.db.clone(),
        }
    }

    pub fn consumed_event_store(&self) -> DbConsumedEventStore {
        DbConsumedEventStore {
            db: self.db.clone(),
        }
    }

    pub fn issuance_queue(&self) -> RedisIssuanceQueue {
        RedisIssuanceQueue::new(self.redis.clone(), self.config.issue_queue_key.clone())
    }

    pub fn publisher(&self) -> RedisStreamPublisher {
        RedisStreamPublisher::new(self.redis.clone())
    }

    pub fn lock_executor(&self) -> RedisLockExecutor {
        RedisLockExecutor::new(
            self.redis.clone(),
            Duration::from_millis(self.config.lock_wait_ms),
        )
    }

    pub fn outbox_service(&self) -> OutboxService<DbOutboxStore, RedisStreamPublisher> {
        OutboxService::new(self.outbox_store(), self.publisher())
    }

    pub fn event_consumer(&self, stream: &str) -> RedisStreamConsumer {
        RedisStreamConsumer::new(
            self.redis.clone(),
            stream,
            self.config.event_consumer_group.clone(),
            self.config.event_consumer_name.clone(),
        )
    }
}
