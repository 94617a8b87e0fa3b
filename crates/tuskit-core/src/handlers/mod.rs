//! Intent handlers.
//!
//! Every intent except `NotApplicable` has a handler. A handler lists its
//! requirements, fires its pre-action hook, performs the store action and
//! fires its post-action hooks. The runner drives these steps in order and
//! owns everything around them (authorization, version check, locking).

mod concat;
mod create;
mod delete;
mod info;
mod options;
mod write;

use crate::context::RequestContext;
use crate::error::TusResult;
use crate::events::{EventOutcome, Events, FileCompleteContext};
use crate::intent::Intent;
use crate::requirements::Requirement;

/// What the store action did, for the post-action hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActionOutcome {
    /// The action stopped the request itself (e.g. checksum mismatch).
    Stopped,
    /// An upload was created.
    Created {
        upload_id: String,
        upload_length: Option<u64>,
        completed: bool,
    },
    /// Data was appended.
    Written { upload_id: String, completed: bool },
    /// An upload was deleted.
    Deleted { upload_id: String },
    /// A read-only action produced its response.
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntentHandler {
    Create,
    Concatenate,
    Write,
    Delete,
    Info,
    Options,
}

impl IntentHandler {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::CreateFile => Some(Self::Create),
            Intent::ConcatenateFiles => Some(Self::Concatenate),
            Intent::WriteFile => Some(Self::Write),
            Intent::DeleteFile => Some(Self::Delete),
            Intent::GetFileInfo => Some(Self::Info),
            Intent::GetOptions => Some(Self::Options),
            Intent::NotApplicable => None,
        }
    }

    pub fn intent(self) -> Intent {
        match self {
            Self::Create => Intent::CreateFile,
            Self::Concatenate => Intent::ConcatenateFiles,
            Self::Write => Intent::WriteFile,
            Self::Delete => Intent::DeleteFile,
            Self::Info => Intent::GetFileInfo,
            Self::Options => Intent::GetOptions,
        }
    }

    pub fn requirements(self) -> &'static [Requirement] {
        match self {
            Self::Create => create::REQUIREMENTS,
            Self::Concatenate => concat::REQUIREMENTS,
            Self::Write => write::REQUIREMENTS,
            Self::Delete => delete::REQUIREMENTS,
            Self::Info => info::REQUIREMENTS,
            Self::Options => &[],
        }
    }

    pub async fn before_action(self, ctx: &mut RequestContext, events: &Events) -> EventOutcome {
        match self {
            Self::Create | Self::Concatenate => create::before(ctx, events).await,
            Self::Write => write::before(ctx, events).await,
            Self::Delete => delete::before(ctx, events).await,
            Self::Info | Self::Options => EventOutcome::proceed(),
        }
    }

    pub async fn invoke(self, ctx: &mut RequestContext) -> TusResult<ActionOutcome> {
        match self {
            Self::Create => create::invoke(ctx).await,
            Self::Concatenate => concat::invoke(ctx).await,
            Self::Write => write::invoke(ctx).await,
            Self::Delete => delete::invoke(ctx).await,
            Self::Info => info::invoke(ctx).await,
            Self::Options => options::invoke(ctx).await,
        }
    }

    pub async fn after_action(
        self,
        ctx: &mut RequestContext,
        outcome: &ActionOutcome,
        events: &Events,
    ) -> EventOutcome {
        match outcome {
            ActionOutcome::Created {
                upload_id,
                upload_length,
                completed,
            } => {
                let created =
                    create::after(ctx, events, upload_id, *upload_length).await;
                if created.has_failed() || !completed {
                    return created;
                }
                file_complete(ctx, events, upload_id).await
            }
            ActionOutcome::Written {
                upload_id,
                completed: true,
            } => file_complete(ctx, events, upload_id).await,
            ActionOutcome::Deleted { upload_id } => delete::after(events, upload_id).await,
            ActionOutcome::Written { .. } | ActionOutcome::Stopped | ActionOutcome::Responded => {
                EventOutcome::proceed()
            }
        }
    }
}

async fn file_complete(ctx: &mut RequestContext, events: &Events, upload_id: &str) -> EventOutcome {
    tracing::debug!(upload_id = %upload_id, "upload complete");
    let store = ctx.store.clone();
    let cancellation = ctx.cancellation.clone();
    events
        .file_complete(|| FileCompleteContext {
            upload_id: upload_id.to_owned(),
            store,
            cancellation,
        })
        .await
}
