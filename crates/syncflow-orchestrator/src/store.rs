//! In-memory task view and job history.
//!
//! Used by tests and by runs that do not need durable history.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use syncflow_protocols::{
    Job, JobCounters, JobId, JobLog, JobQuery, JobRepository, JobStatus, RepositoryError, Task,
    TaskCatalog, TaskId, TaskStore,
};

#[derive(Default)]
struct MemoryState {
    tasks: BTreeMap<TaskId, Task>,
    jobs: HashMap<JobId, Job>,
    logs: HashMap<JobId, Vec<JobLog>>,
}

/// Task catalog and job repository backed by a single in-process map.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with `tasks`.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let state = MemoryState {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

fn ensure_running(job: &Job) -> Result<(), RepositoryError> {
    if job.status.is_terminal() {
        return Err(RepositoryError::AlreadyFinished {
            id: job.id.to_string(),
            status: job.status,
        });
    }
    Ok(())
}

#[async_trait]
impl TaskCatalog for MemoryRepository {
    async fn list_all_tasks(&self) -> Result<Vec<Task>, RepositoryError> {
        Ok(self.state.read().await.tasks.values().cloned().collect())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, RepositoryError> {
        Ok(self.state.read().await.tasks.get(id).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryRepository {
    async fn upsert_task(&self, task: &Task) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .tasks
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.tasks.remove(id).is_none() {
            return Err(RepositoryError::TaskNotFound(id.to_string()));
        }
        let removed: Vec<JobId> = state
            .jobs
            .values()
            .filter(|j| j.task_id == id)
            .map(|j| j.id)
            .collect();
        for job_id in removed {
            state.jobs.remove(&job_id);
            state.logs.remove(&job_id);
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MemoryRepository {
    async fn create_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(RepositoryError::StorageError(format!(
                "Job {} already exists",
                job.id
            )));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn append_log(&self, log: &JobLog) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.jobs.contains_key(&log.job_id) {
            return Err(RepositoryError::JobNotFound(log.job_id.to_string()));
        }
        state.logs.entry(log.job_id).or_default().push(log.clone());
        Ok(())
    }

    async fn update_progress(
        &self,
        job_id: JobId,
        counters: &JobCounters,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| RepositoryError::JobNotFound(job_id.to_string()))?;
        ensure_running(job)?;
        job.counters = *counters;
        Ok(())
    }

    async fn finish_job(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| RepositoryError::JobNotFound(job.id.to_string()))?;
        ensure_running(stored)?;
        *stored = job.clone();
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, RepositoryError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| query.task_id.as_ref().is_none_or(|id| &j.task_id == id))
            .filter(|j| query.status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(query.limit);
        Ok(jobs)
    }

    async fn list_logs(&self, job_id: JobId) -> Result<Vec<JobLog>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .logs
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.jobs.remove(&id).is_none() {
            return Err(RepositoryError::JobNotFound(id.to_string()));
        }
        state.logs.remove(&id);
        Ok(())
    }

    async fn fail_orphaned_jobs(&self, reason: &str) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let mut closed = 0;
        for job in state.jobs.values_mut() {
            if job.status == JobStatus::Running
                && job.finish(JobStatus::Failed, Some(reason.to_string())).is_ok()
            {
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncflow_protocols::{EngineEvent, TriggerKind};

    fn task(id: &str) -> Task {
        Task::new(id, "/tmp/src", "remote", "backup")
    }

    #[tokio::test]
    async fn test_task_crud() {
        let repo = MemoryRepository::with_tasks([task("b"), task("a")]);
        let ids: Vec<_> = repo
            .list_all_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        repo.upsert_task(&task("a").with_schedule("@daily")).await.unwrap();
        assert_eq!(repo.get_task("a").await.unwrap().unwrap().schedule, "@daily");

        repo.delete_task("a").await.unwrap();
        assert!(repo.get_task("a").await.unwrap().is_none());
        assert!(matches!(
            repo.delete_task("a").await,
            Err(RepositoryError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_is_final() {
        let repo = MemoryRepository::new();
        let mut job = Job::start("a", TriggerKind::Manual);
        repo.create_job(&job).await.unwrap();

        job.finish(JobStatus::Success, None).unwrap();
        repo.finish_job(&job).await.unwrap();

        let err = repo.finish_job(&job).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyFinished { .. }));
        assert!(repo.update_progress(job.id, &job.counters).await.is_err());
    }

    #[tokio::test]
    async fn test_logs_keep_order() {
        let repo = MemoryRepository::new();
        let job = Job::start("a", TriggerKind::Manual);
        repo.create_job(&job).await.unwrap();

        for name in ["one", "two", "three"] {
            let log = JobLog::from_event(job.id, &EngineEvent::transferred(name, 1));
            repo.append_log(&log).await.unwrap();
        }

        let paths: Vec<_> = repo
            .list_logs(job.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|l| l.path)
            .collect();
        assert_eq!(paths, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_delete_task_cascades() {
        let repo = MemoryRepository::with_tasks([task("a")]);
        let job = Job::start("a", TriggerKind::Manual);
        repo.create_job(&job).await.unwrap();
        repo.append_log(&JobLog::from_event(job.id, &EngineEvent::deleted("x")))
            .await
            .unwrap();

        repo.delete_task("a").await.unwrap();
        assert!(repo.get_job(job.id).await.unwrap().is_none());
        assert!(repo.list_logs(job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_jobs_filters() {
        let repo = MemoryRepository::new();
        let mut done = Job::start("a", TriggerKind::Schedule);
        repo.create_job(&done).await.unwrap();
        done.finish(JobStatus::Failed, Some("boom".into())).unwrap();
        repo.finish_job(&done).await.unwrap();
        repo.create_job(&Job::start("a", TriggerKind::Manual)).await.unwrap();
        repo.create_job(&Job::start("b", TriggerKind::Manual)).await.unwrap();

        assert_eq!(repo.list_jobs(&JobQuery::default()).await.unwrap().len(), 3);
        assert_eq!(repo.list_jobs(&JobQuery::for_task("a")).await.unwrap().len(), 2);
        let failed = repo
            .list_jobs(&JobQuery::for_task("a").with_status(JobStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
        assert_eq!(
            repo.list_jobs(&JobQuery::default().with_limit(1)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_fail_orphaned_jobs() {
        let repo = MemoryRepository::new();
        let orphan = Job::start("a", TriggerKind::Schedule);
        repo.create_job(&orphan).await.unwrap();

        assert_eq!(repo.fail_orphaned_jobs("interrupted").await.unwrap(), 1);
        let stored = repo.get_job(orphan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("interrupted"));
        assert!(stored.finished_at.is_some());

        assert_eq!(repo.fail_orphaned_jobs("interrupted").await.unwrap(), 0);
    }
}
