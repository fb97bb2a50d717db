use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;

use catsync_common::error::CatsyncError;
use catsync_db::backend::models::Backend;
use catsync_db::binding::models::{CategoryBinding, CategoryBindingUpsert};
use catsync_db::binding::repositories::CategoryBindingRepository;

use crate::magento::adapter::CategoryAdapter;
use crate::magento::error::RemoteError;
use crate::magento::record::{CategoryRecord, RemoteId};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] CatsyncError),

    #[error("category {0} appears twice in its own parent chain")]
    HierarchyCycle(RemoteId),
}

impl ImportError {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_terminal(),
            Self::Storage(_) => false,
            Self::HierarchyCycle(_) => true,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    upserted: usize,
    skipped: usize,
    errors: usize,
}

#[derive(Debug)]
pub struct ImportOutcome {
    /// Binding of the requested category.
    pub binding: CategoryBinding,
    pub upserted: usize,
    pub skipped: usize,
    /// Children that vanished or failed for good while importing the subtree.
    pub errors: usize,
}

impl ImportOutcome {
    pub fn summary(&self) -> String {
        format!(
            "category {} bound to {}: {} upserted, {} skipped, {} errors",
            self.binding.external_id,
            self.binding.category_id,
            self.upserted,
            self.skipped,
            self.errors
        )
    }
}

/// Imports one remote category, binding its unbound ancestors first.
pub struct CategoryImporter<'a, R> {
    backend: &'a Backend,
    adapter: Arc<dyn CategoryAdapter>,
    bindings: &'a R,
}

impl<'a, R> CategoryImporter<'a, R>
where
    R: CategoryBindingRepository,
{
    pub fn new(backend: &'a Backend, adapter: Arc<dyn CategoryAdapter>, bindings: &'a R) -> Self {
        Self {
            backend,
            adapter,
            bindings,
        }
    }

    fn storeview(&self) -> Option<&str> {
        self.backend.default_storeview.as_deref()
    }

    pub async fn run(
        &self,
        external_id: RemoteId,
        force: bool,
        import_child: bool,
    ) -> Result<ImportOutcome, ImportError> {
        tracing::info!(
            backend_id = %self.backend.id,
            external_id,
            force,
            import_child,
            protocol = %self.adapter.protocol(),
            "importing category"
        );

        let mut tally = Tally::default();
        let record = self.adapter.read(external_id, self.storeview(), None).await?;
        let binding = self.import_record(record, force, &mut tally).await?;

        if import_child {
            self.import_children(external_id, force, &mut tally).await?;
        }

        tracing::info!(
            backend_id = %self.backend.id,
            external_id,
            upserted = tally.upserted,
            skipped = tally.skipped,
            errors = tally.errors,
            "category import completed"
        );
        Ok(ImportOutcome {
            binding,
            upserted: tally.upserted,
            skipped: tally.skipped,
            errors: tally.errors,
        })
    }

    /// Read every unbound ancestor, then write root-first. Nothing is written
    /// unless the whole chain could be read.
    async fn import_record(
        &self,
        record: CategoryRecord,
        force: bool,
        tally: &mut Tally,
    ) -> Result<CategoryBinding, ImportError> {
        let mut ancestors: Vec<CategoryRecord> = Vec::new();
        let mut seen = HashSet::from([record.id]);
        let mut anchor: Option<CategoryBinding> = None;
        let mut cursor = record.parent_id;

        while let Some(parent_id) = cursor {
            // A bound ancestor can still close a cycle the remote just introduced.
            if !seen.insert(parent_id) {
                return Err(ImportError::HierarchyCycle(parent_id));
            }
            let bound = self
                .bindings
                .get_by_external_id(self.backend.id, &parent_id.to_string())
                .await?;
            if let Some(bound) = bound {
                anchor = Some(bound);
                break;
            }

            tracing::debug!(
                backend_id = %self.backend.id,
                external_id = parent_id,
                "reading unbound parent"
            );
            let parent = self.adapter.read(parent_id, self.storeview(), None).await?;
            cursor = parent.parent_id;
            ancestors.push(parent);
        }

        let mut parent_binding_id = anchor.map(|binding| binding.id);
        for ancestor in ancestors.into_iter().rev() {
            let binding = self.bind(ancestor, parent_binding_id, force, tally).await?;
            parent_binding_id = Some(binding.id);
        }
        self.bind(record, parent_binding_id, force, tally).await
    }

    async fn bind(
        &self,
        record: CategoryRecord,
        parent_id: Option<uuid::Uuid>,
        force: bool,
        tally: &mut Tally,
    ) -> Result<CategoryBinding, ImportError> {
        let external_id = record.id.to_string();

        if !force {
            let existing = self
                .bindings
                .get_by_external_id(self.backend.id, &external_id)
                .await?;
            if let Some(existing) = existing.filter(|b| is_up_to_date(&record, b, parent_id)) {
                tracing::debug!(
                    backend_id = %self.backend.id,
                    external_id = %external_id,
                    "category unchanged since last sync, skipping"
                );
                tally.skipped += 1;
                return Ok(existing);
            }
        }

        let binding = self
            .bindings
            .upsert_by_external_id(CategoryBindingUpsert {
                backend_id: self.backend.id,
                external_id,
                parent_id,
                name: record.name,
                description: record.description,
                protocol_version: self.adapter.protocol(),
                sync_date: Utc::now(),
                raw_ref: Some(record.raw),
            })
            .await?;
        tally.upserted += 1;
        Ok(binding)
    }

    /// Breadth-first over the remote subtree; each level is bound before the next
    /// is read.
    async fn import_children(
        &self,
        root: RemoteId,
        force: bool,
        tally: &mut Tally,
    ) -> Result<(), ImportError> {
        let mut queue = VecDeque::from([root]);
        let mut visited = HashSet::from([root]);

        while let Some(parent) = queue.pop_front() {
            for child in self.children_of(parent).await? {
                if !visited.insert(child) {
                    continue;
                }
                let imported = match self.adapter.read(child, self.storeview(), None).await {
                    Ok(record) => self.import_record(record, force, tally).await,
                    Err(err) => Err(err.into()),
                };
                match imported {
                    Ok(_) => queue.push_back(child),
                    Err(err) if err.is_terminal() => {
                        tracing::warn!(
                            backend_id = %self.backend.id,
                            external_id = child,
                            error = %err,
                            "failed to import child category"
                        );
                        tally.errors += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    async fn children_of(&self, parent: RemoteId) -> Result<Vec<RemoteId>, ImportError> {
        match self
            .adapter
            .list_children(parent, self.storeview(), Some(1))
            .await
        {
            Ok(children) => Ok(children),
            Err(RemoteError::NotSupported { .. }) => {
                let tree = self
                    .adapter
                    .fetch_tree(Some(parent), self.storeview(), Some(1))
                    .await?;
                let children = match tree.get(parent) {
                    Some(subtree) => subtree.ids().collect(),
                    None => tree.ids().filter(|id| *id != parent).collect(),
                };
                Ok(children)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Unchanged remotely since the binding was last written, under the same parent.
fn is_up_to_date(
    record: &CategoryRecord,
    binding: &CategoryBinding,
    parent_id: Option<uuid::Uuid>,
) -> bool {
    binding.parent_id == parent_id
        && record
            .updated_at
            .map_or(false, |updated_at| updated_at <= binding.sync_date)
}
