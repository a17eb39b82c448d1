use anyhow::{Context, Result};

pub type StageFn<'a, S> = Box<dyn Fn(&mut S, bool) -> Result<()> + 'a>;

pub struct StageDefinition<'a, S> {
    pub name: &'a str,
    pub description: String,
    pub run: StageFn<'a, S>,
}

impl<'a, S> StageDefinition<'a, S> {
    pub fn new(
        name: &'a str,
        description: impl Into<String>,
        run: impl Fn(&mut S, bool) -> Result<()> + 'a,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            run: Box::new(run),
        }
    }
}

pub trait WorkflowState {
    fn is_completed(&self, stage: &str) -> bool;
    fn set_current(&mut self, stage: &str);
    fn mark_completed(&mut self, stage: &str);
}

pub trait StateStore<S>: Send + Sync {
    fn load(&self) -> Result<Option<S>>;
    fn save(&self, state: &S) -> Result<()>;
}

/// Store that never remembers anything: every run starts from a fresh state
/// and executes every stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl<S> StateStore<S> for NoStore {
    fn load(&self) -> Result<Option<S>> {
        Ok(None)
    }

    fn save(&self, _state: &S) -> Result<()> {
        Ok(())
    }
}

/// Runs stages strictly in order and stops at the first failing one.
pub struct StageRunner<S, Store> {
    store: Store,
    dry_run: bool,
    init_state: Box<dyn Fn(bool) -> S + Send + Sync>,
}

impl<S, Store> StageRunner<S, Store>
where
    S: WorkflowState,
    Store: StateStore<S>,
{
    pub fn new(
        store: Store,
        dry_run: bool,
        init_state: impl Fn(bool) -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            dry_run,
            init_state: Box::new(init_state),
        }
    }

    pub fn run(&self, stages: &[StageDefinition<'_, S>]) -> Result<S> {
        let mut state = self
            .store
            .load()?
            .unwrap_or_else(|| (self.init_state)(self.dry_run));

        let total = stages.len();
        for (idx, stage) in stages.iter().enumerate() {
            if state.is_completed(stage.name) {
                log::info!(
                    "⏭️  [{}/{}] {} already completed, skipping",
                    idx + 1,
                    total,
                    stage.name
                );
                continue;
            }
            log::info!(
                "▶️  [{}/{}] {}: {}",
                idx + 1,
                total,
                stage.name,
                stage.description
            );
            state.set_current(stage.name);
            self.store.save(&state)?;

            (stage.run)(&mut state, self.dry_run)
                .with_context(|| format!("stage '{}' failed", stage.name))?;

            state.mark_completed(stage.name);
            self.store.save(&state)?;
        }

        Ok(state)
    }
}
