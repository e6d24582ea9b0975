use sea_orm::{ActiveValue, DatabaseConnection, prelude::*};

use crate::{ResultEngine, users, util::normalize_required_name};

mod accounts;
mod balances;
mod cascade;
mod debts;
mod entries;

pub use debts::SETTLE_TOLERANCE_MINOR;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Ensure a user row exists for `username`; every account and entry is
    /// owned by a registered user. Idempotent.
    pub async fn ensure_user(&self, username: &str) -> ResultEngine<()> {
        let username = normalize_required_name(username, "user")?;
        let exists = users::Entity::find_by_id(username.clone())
            .one(&self.database)
            .await?
            .is_some();
        if !exists {
            let user = users::ActiveModel {
                username: ActiveValue::Set(username),
            };
            user.insert(&self.database).await?;
        }
        Ok(())
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
