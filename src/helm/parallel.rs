use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::Arc;

use threadpool::ThreadPool;

use super::Renderer;
use super::{ErrorKind, Result};
use crate::suite::{CaseReport, Suite};

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Threaded mass render of every case in a set of suites
///
/// Cases share nothing but the renderer, and every values file is owned by its case.
/// All cases run to completion; reports come back sorted by suite and case name.
/// A case that panics, or otherwise never reports back, is reported as failed.
pub fn run_suites(suites: Vec<Suite>, renderer: Arc<dyn Renderer>, n_workers: usize) -> Vec<CaseReport> {
    let n_jobs: usize = suites.iter().map(|s| s.cases.len()).sum();
    let n_workers = n_workers.max(1);
    let pool = ThreadPool::new(n_workers);
    info!("Starting {} parallel render jobs using {} workers", n_jobs, n_workers);

    let (tx, rx) = channel();
    let mut expected = Vec::with_capacity(n_jobs);
    for suite in suites {
        let suite = Arc::new(suite);
        for idx in 0..suite.cases.len() {
            expected.push((suite.name.clone(), suite.cases[idx].name.clone()));
            // satisfying thread safety
            let suite = Arc::clone(&suite);
            let renderer = Arc::clone(&renderer);

            let tx = tx.clone(); // tx channel reused in each thread
            pool.execute(move || {
                let case = &suite.cases[idx];
                debug!("Running {} / {}", suite.name, case.name);
                let report = panic::catch_unwind(AssertUnwindSafe(|| suite.run_case(case, renderer.as_ref())))
                    .unwrap_or_else(|payload| {
                        let reason = panic_reason(payload);
                        error!("{} / {} panicked: {}", suite.name, case.name, reason);
                        CaseReport {
                            suite: suite.name.clone(),
                            case: case.name.clone(),
                            result: Err(ErrorKind::CasePanicked(reason).into()),
                        }
                    });
                // receiver outlives the pool, a failed send means we are shutting down
                let _ = tx.send(report);
            });
        }
    }
    drop(tx);

    let mut reports = rx.iter().take(n_jobs).collect::<Vec<_>>();
    if reports.len() != n_jobs {
        warn!("Only {} of {} render jobs reported back", reports.len(), n_jobs);
        let mut missing = BTreeMap::new();
        for key in expected {
            *missing.entry(key).or_insert(0usize) += 1;
        }
        for r in &reports {
            if let Some(n) = missing.get_mut(&(r.suite.clone(), r.case.clone())) {
                *n = n.saturating_sub(1);
            }
        }
        for ((suite, case), n) in missing {
            for _ in 0..n {
                let reason = "no report received".to_string();
                reports.push(CaseReport {
                    suite: suite.clone(),
                    case: case.clone(),
                    result: Err(ErrorKind::CasePanicked(reason).into()),
                });
            }
        }
    }
    reports.sort_by(|a, b| (&a.suite, &a.case).cmp(&(&b.suite, &b.case)));
    reports
}

/// Log every failure and return an error if there was any
pub fn summarize(reports: &[CaseReport]) -> Result<()> {
    let failed = reports.iter().filter(|r| !r.passed()).collect::<Vec<_>>();
    for r in &failed {
        if let Err(e) = &r.result {
            error!("FAIL {} / {}: {}", r.suite, r.case, e);
            for c in e.iter().skip(1) {
                warn!("caused by: {}", c);
            }
        }
    }
    info!("{} passed, {} failed", reports.len() - failed.len(), failed.len());
    if !failed.is_empty() {
        bail!(ErrorKind::SuiteFailures(failed.len()));
    }
    Ok(())
}
