//! Batch Committer
//!
//! Drains the pending state of every clone proxy and issues the writes to the
//! store, at most `commit_concurrency` at a time. Writes to different
//! entities or fields are unordered; the members of one collection are added
//! one by one in their staged order.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use log::{debug, info};

use super::CloneSession;
use crate::error::{Error, Result};
use crate::events::CloneEvent;
use crate::value::{EntityId, EntityKey, FileRef, Value};

/// Summary of a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Clone proxies that had pending writes.
    pub clones: usize,
    pub updates: usize,
    pub members_added: usize,
    pub files_copied: usize,
}

#[derive(Debug)]
enum Write {
    Update {
        key: EntityKey,
        fields: BTreeMap<String, Value>,
    },
    AddMembers {
        key: EntityKey,
        field: String,
        members: Vec<EntityId>,
    },
    CopyFile {
        key: EntityKey,
        file: FileRef,
    },
}

impl CloneSession {
    /// Flush pending writes of every clone proxy.
    ///
    /// Pending state is drained before the first write, so a second commit
    /// only sends what was staged in between. The first failing write aborts
    /// the commit; writes already issued are not rolled back.
    pub async fn commit(&self) -> Result<CommitReport> {
        let mut report = CommitReport::default();
        let mut writes = Vec::new();
        let mut committed = Vec::new();

        {
            let mut state = self.lock()?;
            let ids: Vec<_> = state.registry.proxy_ids().collect();
            for id in ids {
                let proxy = state.registry.proxy_mut(id)?;
                if !proxy.is_clone || !proxy.has_pending_writes() {
                    continue;
                }
                let key = proxy.key().ok_or_else(|| Error::PendingCreation {
                    type_name: proxy.type_name.clone(),
                })?;

                let fields = std::mem::take(&mut proxy.pending_fields);
                let collections = std::mem::take(&mut proxy.pending_collections);
                let files = std::mem::take(&mut proxy.pending_files);

                let field_count = fields.len();
                if !fields.is_empty() {
                    report.updates += 1;
                    writes.push(Write::Update {
                        key: key.clone(),
                        fields,
                    });
                }

                let mut member_count = 0;
                for (field, members) in collections {
                    if members.is_empty() {
                        continue;
                    }
                    member_count += members.len();
                    writes.push(Write::AddMembers {
                        key: key.clone(),
                        field,
                        members,
                    });
                }
                report.members_added += member_count;

                report.files_copied += files.len();
                let file_count = files.len();
                for file in files {
                    writes.push(Write::CopyFile {
                        key: key.clone(),
                        file,
                    });
                }

                report.clones += 1;
                committed.push((key, field_count, member_count, file_count));
            }
        }

        debug!("Committing {} writes for {} clones", writes.len(), report.clones);

        let mut results = stream::iter(writes)
            .map(|write| self.issue(write))
            .buffer_unordered(self.config.effective_concurrency());
        while let Some(result) = results.next().await {
            result?;
        }

        for (key, fields, members, files) in committed {
            self.events.emit(CloneEvent::Committed {
                key,
                fields,
                members,
                files,
            });
        }

        info!(
            "Committed {} clones: {} updates, {} members, {} files",
            report.clones, report.updates, report.members_added, report.files_copied
        );
        Ok(report)
    }

    async fn issue(&self, write: Write) -> Result<()> {
        match write {
            Write::Update { key, fields } => {
                self.store
                    .update_entity(&key.type_name, &key.id, fields)
                    .await
            }
            Write::AddMembers {
                key,
                field,
                members,
            } => {
                for member in &members {
                    self.store
                        .add_collection_member(&key.type_name, &key.id, &field, member)
                        .await?;
                }
                Ok(())
            }
            Write::CopyFile { key, file } => {
                self.store
                    .copy_file_by_url(&file, &key.type_name, &key.id, &self.config.auth_headers)
                    .await
            }
        }
    }
}
