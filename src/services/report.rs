use crate::{
    config::LifecycleConfig,
    error::{AppError, AppResult},
    models::{NewReport, Report, ReportStatus},
    services::store::ReportStore,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone)]
pub struct ReportService {
    store: ReportStore,
    config: LifecycleConfig,
}

impl ReportService {
    pub fn new(store: ReportStore, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    pub async fn submit(&self, input: NewReport) -> AppResult<Report> {
        let input = NewReport {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            location: input.location.trim().to_string(),
            image: input.image,
            category: input.category.trim().to_string(),
        };

        if self.config.require_fields {
            validate_required(&input)?;
        }

        let report = Report::new(input, Utc::now());
        let created = report.clone();
        self.store
            .mutate(move |reports| {
                reports.push(report);
                Ok::<_, AppError>(())
            })
            .await?;

        tracing::info!(
            "Report {} submitted in category '{}'",
            created.id,
            created.category
        );
        Ok(created)
    }

    pub async fn list(&self, status: Option<&str>) -> AppResult<Vec<Report>> {
        let status = status
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .transpose()?;
        Ok(self.store.list(status).await)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Report> {
        self.store.find_by_id(id).await.ok_or(AppError::NotFound)
    }

    /// Move a report to `status`. With `force` (only when overrides are enabled)
    /// the transition table is bypassed; timestamps already set are still kept.
    pub async fn update_status(&self, id: Uuid, status: &str, force: bool) -> AppResult<Report> {
        let next = parse_status(status)?;

        if force && !self.config.allow_status_override {
            return Err(AppError::Validation(
                "Status override is disabled".to_string(),
            ));
        }

        let (updated, changed) = self
            .transition(id, move |report, now| {
                if !force && !report.status.can_transition_to(next) {
                    return Err(AppError::Validation(format!(
                        "Cannot change report status from {} to {}",
                        report.status, next
                    )));
                }
                if force && report.status != next {
                    tracing::warn!(
                        "Status override on report {}: {} -> {}",
                        report.id,
                        report.status,
                        next
                    );
                }
                let before = report.status;
                report.enter(next, now);
                Ok(report.status != before)
            })
            .await?;

        if changed {
            tracing::info!("Report {} status is now {}", updated.id, updated.status);
        }
        Ok(updated)
    }

    /// Record the configured fine and reward and resolve the report.
    /// Any resolved report is returned unchanged, fined or not.
    pub async fn issue_fine(&self, id: Uuid) -> AppResult<Report> {
        let fine = self.config.fine_amount;
        let reward = self.config.reward_amount;

        let (updated, fined) = self
            .transition(id, move |report, now| apply_fine(report, fine, reward, now))
            .await?;

        if fined {
            tracing::info!(
                "Report {} resolved with fine {} / reward {}",
                updated.id,
                fine,
                reward
            );
        }
        Ok(updated)
    }

    /// Resolve without a fine. Repeating the call on a resolved report returns it unchanged.
    pub async fn resolve(&self, id: Uuid) -> AppResult<Report> {
        let (updated, resolved) = self
            .transition(id, |report, now| match report.status {
                ReportStatus::Resolved => Ok(false),
                ReportStatus::Verified => {
                    report.enter(ReportStatus::Resolved, now);
                    Ok(true)
                }
                other => Err(AppError::Validation(format!(
                    "Only a verified report can be resolved (status is {})",
                    other
                ))),
            })
            .await?;

        if resolved {
            tracing::info!("Report {} resolved", updated.id);
        }
        Ok(updated)
    }

    /// Apply `apply` to the report with `id` inside one store mutation.
    /// `apply` returns whether it changed the record.
    async fn transition<F>(&self, id: Uuid, apply: F) -> AppResult<(Report, bool)>
    where
        F: FnOnce(&mut Report, DateTime<Utc>) -> AppResult<bool> + Send + 'static,
    {
        self.store
            .mutate(move |reports| -> AppResult<(Report, bool)> {
                let report = reports
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or(AppError::NotFound)?;
                let changed = apply(report, Utc::now())?;
                Ok((report.clone(), changed))
            })
            .await
    }
}

/// Fine a verified report and resolve it. Returns `false` when the report
/// is already resolved and was left as it was.
fn apply_fine(report: &mut Report, fine: u64, reward: u64, now: DateTime<Utc>) -> AppResult<bool> {
    match report.status {
        ReportStatus::Resolved => Ok(false),
        ReportStatus::Verified => {
            report.fine_collected = Some(fine);
            report.reward_disbursed = Some(reward);
            report.enter(ReportStatus::Resolved, now);
            Ok(true)
        }
        other => Err(AppError::Validation(format!(
            "A fine can only be issued for a verified report (status is {})",
            other
        ))),
    }
}

fn parse_status(raw: &str) -> AppResult<ReportStatus> {
    raw.parse::<ReportStatus>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn validate_required(input: &NewReport) -> AppResult<()> {
    let missing: Vec<&str> = [
        ("title", &input.title),
        ("description", &input.description),
        ("location", &input.location),
        ("category", &input.category),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        service: ReportService,
    }

    async fn fixture_with(config: LifecycleConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports.json");
        let store = ReportStore::open(&path).await.unwrap();
        Fixture {
            _dir: dir,
            path,
            service: ReportService::new(store, config),
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(LifecycleConfig::default()).await
    }

    fn pothole() -> NewReport {
        NewReport {
            title: "Pothole".to_string(),
            description: "Large pothole".to_string(),
            location: "MG Road".to_string(),
            image: None,
            category: "Infrastructure".to_string(),
        }
    }

    async fn verified(fx: &Fixture) -> Report {
        let created = fx.service.submit(pothole()).await.unwrap();
        fx.service
            .update_status(created.id, "verified", false)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn pothole_scenario_end_to_end() {
        let fx = fixture().await;

        let created = fx.service.submit(pothole()).await.unwrap();
        assert_eq!(created.status, ReportStatus::Pending);

        let verified = fx
            .service
            .update_status(created.id, "verified", false)
            .await
            .unwrap();
        assert_eq!(verified.status, ReportStatus::Verified);
        assert!(verified.verified_at.is_some());

        let fined = fx.service.issue_fine(created.id).await.unwrap();
        assert_eq!(fined.status, ReportStatus::Resolved);
        assert_eq!(fined.fine_collected, Some(600));
        assert_eq!(fined.reward_disbursed, Some(500));
        assert!(fined.resolved_at.is_some());
        assert_eq!(fined.verified_at, verified.verified_at);
    }

    #[tokio::test]
    async fn submit_assigns_fresh_id_and_timestamp() {
        let fx = fixture().await;
        let start = Utc::now();

        let mut ids = HashSet::new();
        for _ in 0..20 {
            let report = fx.service.submit(pothole()).await.unwrap();
            assert!(report.created_at >= start);
            assert_eq!(report.status, ReportStatus::Pending);
            assert!(ids.insert(report.id));
        }
    }

    #[tokio::test]
    async fn submit_trims_fields_and_keeps_image() {
        let fx = fixture().await;
        let report = fx
            .service
            .submit(NewReport {
                title: "  Fallen tree ".to_string(),
                image: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
                ..pothole()
            })
            .await
            .unwrap();

        assert_eq!(report.title, "Fallen tree");
        assert!(report.image.is_some());
    }

    #[tokio::test]
    async fn submit_with_empty_title_is_rejected() {
        let fx = fixture().await;
        let before = std::fs::read(&fx.path).unwrap();

        let err = fx
            .service
            .submit(NewReport {
                title: "   ".to_string(),
                ..pothole()
            })
            .await
            .unwrap_err();

        match err {
            AppError::Validation(msg) => assert!(msg.contains("title")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(std::fs::read(&fx.path).unwrap(), before);
        assert!(fx.service.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lenient_mode_accepts_blank_fields() {
        let fx = fixture_with(LifecycleConfig {
            require_fields: false,
            ..Default::default()
        })
        .await;

        let report = fx.service.submit(NewReport::default()).await.unwrap();
        assert_eq!(report.title, "");
        assert_eq!(report.status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_and_store_unchanged() {
        let fx = fixture().await;
        fx.service.submit(pothole()).await.unwrap();
        let before = std::fs::read(&fx.path).unwrap();
        let missing = Uuid::new_v4();

        assert!(matches!(
            fx.service.update_status(missing, "verified", false).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            fx.service.issue_fine(missing).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            fx.service.resolve(missing).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(fx.service.get(missing).await, Err(AppError::NotFound)));

        assert_eq!(std::fs::read(&fx.path).unwrap(), before);
    }

    #[tokio::test]
    async fn verifying_twice_keeps_first_timestamp() {
        let fx = fixture().await;
        let first = verified(&fx).await;

        let second = fx
            .service
            .update_status(first.id, "verified", false)
            .await
            .unwrap();

        assert_eq!(second.verified_at, first.verified_at);
    }

    #[tokio::test]
    async fn invalid_status_value_is_rejected() {
        let fx = fixture().await;
        let created = fx.service.submit(pothole()).await.unwrap();

        let err = fx
            .service
            .update_status(created.id, "closed", false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            fx.service.get(created.id).await.unwrap().status,
            ReportStatus::Pending
        );
    }

    #[tokio::test]
    async fn backward_transition_is_rejected() {
        let fx = fixture().await;
        let report = verified(&fx).await;

        let err = fx
            .service
            .update_status(report.id, "pending", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn pending_cannot_skip_to_resolved() {
        let fx = fixture().await;
        let created = fx.service.submit(pothole()).await.unwrap();

        assert!(matches!(
            fx.service.update_status(created.id, "resolved", false).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            fx.service.resolve(created.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            fx.service.issue_fine(created.id).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejected_is_terminal() {
        let fx = fixture().await;
        let created = fx.service.submit(pothole()).await.unwrap();

        let rejected = fx
            .service
            .update_status(created.id, "rejected", false)
            .await
            .unwrap();
        assert_eq!(rejected.status, ReportStatus::Rejected);
        assert!(rejected.verified_at.is_none());

        assert!(fx
            .service
            .update_status(created.id, "verified", false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn force_requires_override_setting() {
        let fx = fixture().await;
        let report = verified(&fx).await;

        let err = fx
            .service
            .update_status(report.id, "pending", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn override_bypasses_table_but_keeps_timestamps() {
        let fx = fixture_with(LifecycleConfig {
            allow_status_override: true,
            ..Default::default()
        })
        .await;
        let report = verified(&fx).await;

        let reverted = fx
            .service
            .update_status(report.id, "pending", true)
            .await
            .unwrap();

        assert_eq!(reverted.status, ReportStatus::Pending);
        assert_eq!(reverted.verified_at, report.verified_at);
    }

    #[tokio::test]
    async fn issue_fine_uses_configured_amounts() {
        let fx = fixture_with(LifecycleConfig {
            fine_amount: 1000,
            reward_amount: 250,
            ..Default::default()
        })
        .await;
        let report = verified(&fx).await;

        let fined = fx.service.issue_fine(report.id).await.unwrap();
        assert_eq!(fined.fine_collected, Some(1000));
        assert_eq!(fined.reward_disbursed, Some(250));
    }

    #[tokio::test]
    async fn issue_fine_twice_is_a_no_op() {
        let fx = fixture().await;
        let report = verified(&fx).await;

        let first = fx.service.issue_fine(report.id).await.unwrap();
        let second = fx.service.issue_fine(report.id).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolve_leaves_fine_fields_absent() {
        let fx = fixture().await;
        let report = verified(&fx).await;

        let resolved = fx.service.resolve(report.id).await.unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert!(resolved.fine_collected.is_none());
        assert!(resolved.reward_disbursed.is_none());

        let again = fx.service.resolve(report.id).await.unwrap();
        assert_eq!(again.resolved_at, resolved.resolved_at);

        let before = std::fs::read(&fx.path).unwrap();
        let fined = fx.service.issue_fine(report.id).await.unwrap();
        assert_eq!(fined, resolved);
        assert!(fined.fine_collected.is_none());
        assert!(fined.reward_disbursed.is_none());
        assert_eq!(std::fs::read(&fx.path).unwrap(), before);
    }

    #[test]
    fn apply_fine_reports_whether_it_fined() {
        let now = Utc::now();
        let mut report = Report::new(pothole(), now);
        report.enter(ReportStatus::Verified, now);

        assert!(apply_fine(&mut report, 600, 500, now).unwrap());
        assert_eq!(report.fine_collected, Some(600));

        let fined = report.clone();
        assert!(!apply_fine(&mut report, 900, 900, Utc::now()).unwrap());
        assert_eq!(report, fined);

        let mut unfined = Report::new(pothole(), now);
        unfined.enter(ReportStatus::Verified, now);
        unfined.enter(ReportStatus::Resolved, now);
        assert!(!apply_fine(&mut unfined, 600, 500, now).unwrap());
        assert!(unfined.fine_collected.is_none());

        let mut pending = Report::new(pothole(), now);
        assert!(matches!(
            apply_fine(&mut pending, 600, 500, now),
            Err(AppError::Validation(_))
        ));
        assert!(pending.fine_collected.is_none());
    }

    #[tokio::test]
    async fn mutations_survive_reload() {
        let fx = fixture().await;
        let report = verified(&fx).await;
        let fined = fx.service.issue_fine(report.id).await.unwrap();

        let reloaded = store::load(&fx.path).await.unwrap();
        assert_eq!(reloaded, vec![fined.clone()]);

        let reopened = ReportStore::open(&fx.path).await.unwrap();
        assert_eq!(reopened.find_by_id(report.id).await, Some(fined));
    }

    #[tokio::test]
    async fn list_filters_by_status_string() {
        let fx = fixture().await;
        fx.service.submit(pothole()).await.unwrap();
        verified(&fx).await;

        assert_eq!(fx.service.list(None).await.unwrap().len(), 2);
        assert_eq!(fx.service.list(Some("")).await.unwrap().len(), 2);
        assert_eq!(fx.service.list(Some("verified")).await.unwrap().len(), 1);
        assert!(fx.service.list(Some("bogus")).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_submissions_are_not_lost() {
        let fx = fixture().await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = fx.service.clone();
                tokio::spawn(async move {
                    service
                        .submit(NewReport {
                            title: format!("Report {}", i),
                            ..pothole()
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store::load(&fx.path).await.unwrap().len(), 16);
        assert_eq!(fx.service.list(None).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn concurrent_transitions_keep_each_others_fields() {
        let fx = fixture().await;
        let a = verified(&fx).await;
        let b = verified(&fx).await;

        let (fined, resolved) = tokio::join!(fx.service.issue_fine(a.id), fx.service.resolve(b.id));
        fined.unwrap();
        resolved.unwrap();

        let on_disk = store::load(&fx.path).await.unwrap();
        let a_disk = on_disk.iter().find(|r| r.id == a.id).unwrap();
        let b_disk = on_disk.iter().find(|r| r.id == b.id).unwrap();
        assert_eq!(a_disk.fine_collected, Some(600));
        assert_eq!(b_disk.status, ReportStatus::Resolved);
        assert!(b_disk.fine_collected.is_none());
    }
}
