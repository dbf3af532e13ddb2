use tracing::info;
use uuid::Uuid;

/// What happened to a mail item, from the owner's point of view.
#[derive(Debug, Clone)]
pub enum OwnerEvent {
    ScanLinked { mail_item_id: Uuid, file_id: Uuid },
}

/// Outbound owner notification, owned by the external notification
/// subsystem. Best-effort by contract: callers log failures and move on;
/// a notification error never rolls back a committed write.
pub trait Notifier: Send + Sync {
    fn notify(&self, owner_id: Uuid, event: &OwnerEvent) -> anyhow::Result<()>;
}

/// Default sink: emits a tracing event. Deployments wire a real transport in
/// its place.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, owner_id: Uuid, event: &OwnerEvent) -> anyhow::Result<()> {
        match event {
            OwnerEvent::ScanLinked {
                mail_item_id,
                file_id,
            } => {
                info!(%owner_id, %mail_item_id, %file_id, "scan linked to mail item");
            }
        }
        Ok(())
    }
}
