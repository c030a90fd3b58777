use anyhow::Context;
use std::sync::Arc;

use crate::store::traits::{BoxFuture, Connection, ConnectionPool};
use crate::store::unit_of_work::UnitOfWork;
use crate::store::DataError;

/// Prepares the tables a repository needs; runs once at startup
pub type Bootstrap = for<'a> fn(&'a mut dyn Connection) -> BoxFuture<'a, anyhow::Result<()>>;

/// A data-access type that works inside exactly one [`UnitOfWork`].
pub trait Repository: Send + Sized + 'static {
    /// Name the repository is registered and looked up under
    const NAME: &'static str;

    fn bootstrap(conn: &mut dyn Connection) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Wrap a freshly opened unit
    fn bind(unit: UnitOfWork) -> Self;

    fn unit(&mut self) -> &mut UnitOfWork;
}

struct RepositoryEntry {
    name: &'static str,
    bootstrap: Bootstrap,
}

/// Name to repository lookup, sharing one pool.
///
/// Every [`acquire`](Self::acquire) hands out a new unit with its own
/// connection; nothing is shared between callers.
pub struct RepositoryRegistry {
    pool: Arc<dyn ConnectionPool>,
    entries: Vec<RepositoryEntry>,
}

impl RepositoryRegistry {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            pool,
            entries: Vec::new(),
        }
    }

    pub fn register<R: Repository>(&mut self) -> Result<&mut Self, DataError> {
        self.register_named(R::NAME, R::bootstrap)
    }

    pub fn register_named(&mut self, name: &'static str, bootstrap: Bootstrap) -> Result<&mut Self, DataError> {
        if self.contains(name) {
            return Err(DataError::DuplicateRepository(name.to_string()));
        }
        self.entries.push(RepositoryEntry { name, bootstrap });
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Run every bootstrap in registration order inside one transaction
    pub async fn init(&self) -> anyhow::Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for repository setup")?;

        for entry in &self.entries {
            (entry.bootstrap)(conn.as_mut())
                .await
                .with_context(|| format!("Failed to initialize repository '{}'", entry.name))?;
            log::debug!("Initialized repository '{}'", entry.name);
        }

        conn.commit().await.context("Failed to commit repository setup")?;
        log::info!("Initialized {} repositories", self.entries.len());
        Ok(())
    }

    /// Open a new unit of work for the repository registered as `name`
    pub async fn acquire(&self, name: &str) -> Result<UnitOfWork, DataError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| DataError::RepositoryNotFound(name.to_string()))?;

        let mut unit = UnitOfWork::new(entry.name);
        unit.open(self.pool.as_ref()).await?;
        Ok(unit)
    }

    /// Typed [`acquire`](Self::acquire)
    pub async fn acquire_as<R: Repository>(&self) -> Result<R, DataError> {
        Ok(R::bind(self.acquire(R::NAME).await?))
    }
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("repositories", &self.names())
            .field("pool", &self.pool.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{JournalEvent, MemoryPool};
    use crate::store::unit_of_work::UnitStatus;

    struct Notes {
        unit: UnitOfWork,
    }

    impl Repository for Notes {
        const NAME: &'static str = "notes";

        fn bootstrap(conn: &mut dyn Connection) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                conn.execute("CREATE TABLE IF NOT EXISTS notes (id TEXT)", &[]).await?;
                Ok(())
            })
        }

        fn bind(unit: UnitOfWork) -> Self {
            Self { unit }
        }

        fn unit(&mut self) -> &mut UnitOfWork {
            &mut self.unit
        }
    }

    fn registry(pool: &MemoryPool) -> RepositoryRegistry {
        let mut registry = RepositoryRegistry::new(Arc::new(pool.clone()));
        registry.register::<Notes>().unwrap();
        registry
    }

    #[tokio::test]
    async fn test_unknown_repository() {
        let pool = MemoryPool::new(2);
        let error = registry(&pool).acquire("Nonexistent").await.unwrap_err();
        assert_eq!(error.to_string(), "Repository type 'Nonexistent' not found");
        assert_eq!(pool.acquired(), 0);
    }

    #[test]
    fn test_duplicate_registration() {
        let pool = MemoryPool::new(2);
        let mut registry = registry(&pool);
        assert!(matches!(
            registry.register::<Notes>(),
            Err(DataError::DuplicateRepository(name)) if name == "notes"
        ));
        assert_eq!(registry.names(), vec!["notes"]);
    }

    #[tokio::test]
    async fn test_each_acquire_is_independent() {
        let pool = MemoryPool::new(2);
        let registry = registry(&pool);

        let mut first = registry.acquire_as::<Notes>().await.unwrap();
        let mut second = registry.acquire_as::<Notes>().await.unwrap();
        assert_eq!(pool.outstanding(), 2);

        first.unit().close().await.unwrap();
        assert_eq!(second.unit().status(), UnitStatus::Open);
        second.unit().rollback().await.unwrap();

        assert_eq!(pool.events_for(1), vec![JournalEvent::Commit]);
        assert_eq!(pool.events_for(2), vec![JournalEvent::Rollback]);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_init_runs_bootstrap_and_commits() {
        let pool = MemoryPool::new(1);
        registry(&pool).init().await.unwrap();

        assert_eq!(
            pool.events_for(1),
            vec![
                JournalEvent::Execute {
                    sql: "CREATE TABLE IF NOT EXISTS notes (id TEXT)".to_string(),
                    params: vec![]
                },
                JournalEvent::Commit
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_init_rolls_back() {
        let pool = MemoryPool::new(1);
        pool.fail_on("CREATE TABLE IF NOT EXISTS notes (id TEXT)");

        let error = registry(&pool).init().await.unwrap_err();
        assert!(format!("{:#}", error).contains("Failed to initialize repository 'notes'"));
        assert_eq!(pool.events_for(1).last(), Some(&JournalEvent::Rollback));
    }
}
