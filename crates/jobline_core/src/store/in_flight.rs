use crate::error::ScheduleError;
use crate::handle::{JobHandle, JobId};
use crate::job::AccessSet;
use std::collections::HashSet;

/// Jobs submitted against one store that may still be running, with the
/// buffers they touch.
///
/// Lives next to the store's columns, so every scheduler submitting to the
/// store checks against the same list. A new job is admitted only if every
/// in-flight job it conflicts with is one of its (transitive) dependencies.
pub(crate) struct InFlightJobs {
    active: Vec<InFlightJob>,
}

struct InFlightJob {
    handle: JobHandle,
    access: AccessSet,
}

impl InFlightJobs {
    pub fn new() -> Self {
        Self { active: Vec::new() }
    }

    pub fn check(
        &mut self,
        name: &str,
        access: &AccessSet,
        dependencies: &[JobHandle],
    ) -> Result<(), ScheduleError> {
        self.active.retain(|job| !job.handle.is_settled());

        // Collect ancestors before testing settle state below: a job that is
        // still unsettled after this point cannot have vanished from the
        // ancestor walk.
        let ancestors = ancestors_of(dependencies);

        for job in &self.active {
            let Some(buffer) = job.access.conflict_with(access) else {
                continue;
            };
            if ancestors.contains(&job.handle.id()) || job.handle.is_settled() {
                continue;
            }
            return Err(ScheduleError::OverlappingWriteViolation {
                buffer,
                job: name.to_string(),
                conflicting: job.handle.name().to_string(),
                conflicting_id: job.handle.id(),
            });
        }
        Ok(())
    }

    pub fn register(&mut self, handle: JobHandle, access: AccessSet) {
        self.active.push(InFlightJob { handle, access });
    }
}

fn ancestors_of(dependencies: &[JobHandle]) -> HashSet<JobId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<JobHandle> = dependencies.to_vec();
    while let Some(handle) = stack.pop() {
        if seen.insert(handle.id()) {
            stack.extend(handle.upstream());
        }
    }
    seen
}
