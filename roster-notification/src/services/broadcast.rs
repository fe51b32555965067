use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use roster_shared::audit::{self, actions, NewActivity};
use roster_shared::errors::{AppError, AppResult, ErrorCode};
use roster_shared::types::auth::{AuthUser, UserRole};

use super::notification_service::NotificationService;
use crate::models::NotificationDraft;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub created: usize,
    pub failed: usize,
}

impl NotificationService {
    /// Fan a notification out to the actor's company, or to one role within it.
    ///
    /// Each recipient gets an independent row. A failed write for one recipient
    /// does not affect the others; only resolving the audience can fail the call.
    pub async fn broadcast(
        &self,
        actor: &AuthUser,
        draft: NotificationDraft,
        target_role: Option<UserRole>,
    ) -> AppResult<BroadcastReport> {
        draft
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

        let company_id = actor.company_id;
        let recipients = self.directory.members_of(company_id, target_role)?;

        let sends = recipients.iter().map(|member| {
            let draft = draft.clone();
            async move { (member.id, self.create(member.id, draft).await) }
        });

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };
        let mut failed_ids: Vec<Uuid> = Vec::new();
        for (recipient_id, outcome) in join_all(sends).await {
            match outcome {
                Ok(_) => report.created += 1,
                Err(e) => {
                    tracing::error!(error = %e, recipient_id = %recipient_id, "broadcast notification failed");
                    failed_ids.push(recipient_id);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            company_id = %company_id,
            target_role = ?target_role,
            recipients = report.recipients,
            created = report.created,
            failed = report.failed,
            "broadcast completed"
        );

        audit::record(
            self.activity.as_ref(),
            NewActivity::new(
                actor.id,
                company_id,
                actions::BROADCAST_NOTIFICATION,
                format!("Broadcast \"{}\" to {} recipients", draft.title, report.recipients),
            )
            .with_metadata(serde_json::json!({
                "target_role": target_role,
                "created": report.created,
                "failed_recipients": failed_ids,
            })),
        );

        Ok(report)
    }
}
