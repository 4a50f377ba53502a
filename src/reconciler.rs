//! Optimistic mutation reconciler.
//!
//! A page applies a user's change to its local collection immediately, sends
//! the request, and then either commits the server's answer, rolls back to
//! the snapshot taken before the change, or keeps the optimistic state when
//! the outcome is unknown. The free functions here are pure over slices;
//! [`OptimisticList`] tracks the in-flight operations per entity id.

use crate::error::{AppError, AppResult, FailureClass};
use crate::models::EntityId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Anything with an identity that can live in a page collection
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> &EntityId;
    fn set_id(&mut self, id: EntityId);
}

/// Shallow merge of a change into an entity
pub trait Patch<E>: Send + Sync {
    fn apply(&self, entity: &mut E);
}

/// Entities a student can join or leave: a head count plus a joined flag
pub trait Membership {
    fn headcount(&self) -> u32;
    fn is_joined(&self) -> bool;
    fn set_membership(&mut self, headcount: u32, joined: bool);
}

/// Join/leave patch; counter and flag always move together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Join,
    Leave,
}

impl<E: Membership> Patch<E> for MembershipChange {
    fn apply(&self, entity: &mut E) {
        let count = entity.headcount();
        match self {
            MembershipChange::Join => entity.set_membership(count.saturating_add(1), true),
            MembershipChange::Leave => entity.set_membership(count.saturating_sub(1), false),
        }
    }
}

/// Patch from a closure
pub struct FnPatch<F>(pub F);

impl<E, F> Patch<E> for FnPatch<F>
where
    F: Fn(&mut E) + Send + Sync,
{
    fn apply(&self, entity: &mut E) {
        (self.0)(entity)
    }
}

/// State captured before a mutation so it can be restored exactly
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<E> {
    /// One entity and the position it held
    Entity { index: usize, entity: E },
    /// The id did not exist before (optimistic insert)
    Absent { id: EntityId },
    /// Whole-collection granularity
    Collection(Vec<E>),
}

impl<E: Entity> Snapshot<E> {
    pub fn capture_entity(items: &[E], id: &EntityId) -> Option<Self> {
        items
            .iter()
            .position(|e| e.id() == id)
            .map(|index| Snapshot::Entity {
                index,
                entity: items[index].clone(),
            })
    }

    pub fn capture_all(items: &[E]) -> Self {
        Snapshot::Collection(items.to_vec())
    }
}

/// Entity at `id` shallow-merged with `patch`; everything else untouched
pub fn apply_optimistic<E: Entity, P: Patch<E> + ?Sized>(items: &[E], id: &EntityId, patch: &P) -> Vec<E> {
    items
        .iter()
        .map(|e| {
            let mut e = e.clone();
            if e.id() == id {
                patch.apply(&mut e);
            }
            e
        })
        .collect()
}

/// New entities render first
pub fn insert_optimistic<E: Entity>(items: &[E], entity: E) -> Vec<E> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.push(entity);
    next.extend(items.iter().cloned());
    next
}

pub fn remove_optimistic<E: Entity>(items: &[E], id: &EntityId) -> Vec<E> {
    items.iter().filter(|e| e.id() != id).cloned().collect()
}

/// Replace the entity at `id` with the server's version, re-keyed to the
/// server id. Another entry already holding the server id is dropped.
pub fn commit<E: Entity>(items: &[E], id: &EntityId, confirmed: E) -> Vec<E> {
    let server_id = confirmed.id().clone();
    if !items.iter().any(|e| e.id() == id) {
        // Optimistic entry is gone; only refresh an existing server copy
        return items
            .iter()
            .map(|e| if *e.id() == server_id { confirmed.clone() } else { e.clone() })
            .collect();
    }

    let mut confirmed = Some(confirmed);
    items
        .iter()
        .filter_map(|e| {
            if e.id() == id {
                confirmed.take()
            } else if *e.id() == server_id {
                None
            } else {
                Some(e.clone())
            }
        })
        .collect()
}

/// Restore the pre-mutation state captured in `snapshot`
pub fn rollback<E: Entity>(items: &[E], snapshot: &Snapshot<E>) -> Vec<E> {
    match snapshot {
        Snapshot::Collection(previous) => previous.clone(),
        Snapshot::Absent { id } => remove_optimistic(items, id),
        Snapshot::Entity { index, entity } => {
            if items.iter().any(|e| e.id() == entity.id()) {
                items
                    .iter()
                    .map(|e| if e.id() == entity.id() { entity.clone() } else { e.clone() })
                    .collect()
            } else {
                let mut next = items.to_vec();
                next.insert((*index).min(next.len()), entity.clone());
                next
            }
        }
    }
}

/// Keep the first occurrence of each id
pub fn dedupe_by_id<E: Entity>(items: Vec<E>) -> Vec<E> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|e| seen.insert(e.id().clone()))
        .collect()
}

/// What to do with optimistic state when the request fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Roll back hard failures; keep state on soft ones
    #[default]
    ByClass,
    /// Roll back on any failure (deletes)
    AlwaysRollback,
}

impl FailurePolicy {
    pub fn should_rollback(&self, err: &AppError) -> bool {
        match self {
            FailurePolicy::AlwaysRollback => true,
            FailurePolicy::ByClass => err.classify() != FailureClass::Soft,
        }
    }
}

/// A local change to start
pub enum Mutation<E> {
    Insert(E),
    Update {
        id: EntityId,
        patch: Box<dyn Patch<E>>,
    },
    Remove(EntityId),
}

impl<E: Entity> Mutation<E> {
    pub fn update(id: EntityId, patch: impl Patch<E> + 'static) -> Self {
        Mutation::Update {
            id,
            patch: Box::new(patch),
        }
    }

    pub fn target(&self) -> &EntityId {
        match self {
            Mutation::Insert(entity) => entity.id(),
            Mutation::Update { id, .. } | Mutation::Remove(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Update,
    Remove,
}

/// Handle for an in-flight mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: EntityId,
    pub kind: OpKind,
    seq: u64,
}

/// How a settled mutation left the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Server confirmed; local state reconciled
    Committed,
    /// Hard failure; snapshot restored
    RolledBack,
    /// Soft failure; optimistic state kept
    Preserved,
    /// Page unmounted before the result arrived
    Discarded,
    /// Ticket no longer matches a pending operation
    Stale,
}

#[derive(Debug)]
struct PendingOp<E> {
    seq: u64,
    snapshot: Snapshot<E>,
}

/// Page collection plus the snapshots of its in-flight mutations
#[derive(Debug)]
pub struct OptimisticList<E: Entity> {
    items: Vec<E>,
    pending: HashMap<EntityId, PendingOp<E>>,
    next_seq: u64,
}

impl<E: Entity> Default for OptimisticList<E> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<E: Entity> OptimisticList<E> {
    pub fn new(items: Vec<E>) -> Self {
        Self {
            items: dedupe_by_id(items),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while a mutation on `id` awaits its response
    pub fn is_pending(&self, id: &EntityId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Install a refetch result. Duplicates are dropped and local-only
    /// placeholders missing from the fetch stay in front.
    pub fn replace_all(&mut self, fetched: Vec<E>) {
        let fetched = dedupe_by_id(fetched);
        let placeholders: Vec<E> = self
            .items
            .iter()
            .filter(|e| e.id().is_provisional() && !fetched.iter().any(|f| f.id() == e.id()))
            .cloned()
            .collect();
        debug!(
            "Replacing {} items with {} fetched ({} local placeholders kept)",
            self.items.len(),
            fetched.len(),
            placeholders.len()
        );
        self.items = placeholders.into_iter().chain(fetched).collect();
    }

    /// Apply a mutation locally and remember how to undo it
    pub fn begin(&mut self, mutation: Mutation<E>) -> AppResult<Ticket> {
        let target = mutation.target().clone();
        if self.pending.contains_key(&target) {
            return Err(AppError::Busy(target));
        }

        let (kind, snapshot, next) = match mutation {
            Mutation::Insert(entity) => {
                if self.get(&target).is_some() {
                    return Err(AppError::Message(format!("{} already exists", target)));
                }
                let snapshot = Snapshot::Absent { id: target.clone() };
                (OpKind::Insert, snapshot, insert_optimistic(&self.items, entity))
            }
            Mutation::Update { id, patch } => {
                let snapshot = Snapshot::capture_entity(&self.items, &id)
                    .ok_or_else(|| AppError::NotFound(id.to_string()))?;
                (OpKind::Update, snapshot, apply_optimistic(&self.items, &id, patch.as_ref()))
            }
            Mutation::Remove(id) => {
                let snapshot = Snapshot::capture_entity(&self.items, &id)
                    .ok_or_else(|| AppError::NotFound(id.to_string()))?;
                (OpKind::Remove, snapshot, remove_optimistic(&self.items, &id))
            }
        };

        self.next_seq += 1;
        let seq = self.next_seq;
        self.items = next;
        self.pending.insert(target.clone(), PendingOp { seq, snapshot });
        debug!("Began {:?} on {} (seq {})", kind, target, seq);

        Ok(Ticket {
            id: target,
            kind,
            seq,
        })
    }

    /// Forget `ticket` without touching the items. Used when nobody is left
    /// to reconcile the answer; the entity accepts new mutations again.
    pub fn abandon(&mut self, ticket: &Ticket) -> bool {
        let matches = self
            .pending
            .get(&ticket.id)
            .is_some_and(|op| op.seq == ticket.seq);
        if matches {
            self.pending.remove(&ticket.id);
            debug!("Abandoned {:?} on {}", ticket.kind, ticket.id);
        }
        matches
    }

    /// Reconcile the server's answer for `ticket`
    pub fn settle(
        &mut self,
        ticket: &Ticket,
        result: &AppResult<Option<E>>,
        policy: FailurePolicy,
    ) -> Resolution {
        let matches = self
            .pending
            .get(&ticket.id)
            .is_some_and(|op| op.seq == ticket.seq);
        if !matches {
            warn!("Ignoring stale result for {}", ticket.id);
            return Resolution::Stale;
        }
        let Some(op) = self.pending.remove(&ticket.id) else {
            return Resolution::Stale;
        };

        match result {
            Ok(Some(confirmed)) if ticket.kind != OpKind::Remove => {
                if confirmed.id() != &ticket.id {
                    info!("Re-keying {} to server id {}", ticket.id, confirmed.id());
                }
                self.items = commit(&self.items, &ticket.id, confirmed.clone());
                Resolution::Committed
            }
            Ok(_) => Resolution::Committed,
            Err(err) if policy.should_rollback(err) => {
                warn!("Rolling back {:?} on {}: {}", ticket.kind, ticket.id, err);
                self.items = rollback(&self.items, &op.snapshot);
                Resolution::RolledBack
            }
            Err(err) => {
                warn!(
                    "Keeping optimistic {:?} on {} after indeterminate failure: {}",
                    ticket.kind, ticket.id, err
                );
                Resolution::Preserved
            }
        }
    }
}

/// Set while the owning page is mounted; late results check it first
#[derive(Debug, Clone)]
pub struct MountGuard(Arc<MountState>);

#[derive(Debug)]
struct MountState {
    mounted: AtomicBool,
    unmounted: Notify,
}

impl Default for MountGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl MountGuard {
    pub fn new() -> Self {
        Self(Arc::new(MountState {
            mounted: AtomicBool::new(true),
            unmounted: Notify::new(),
        }))
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.0.mounted.store(false, Ordering::Release);
        self.0.unmounted.notify_waiters();
    }

    /// Resolves once the page is unmounted
    pub async fn unmounted(&self) {
        let notified = self.0.unmounted.notified();
        tokio::pin!(notified);
        // Register before checking the flag so an unmount in between is not missed
        notified.as_mut().enable();
        if !self.is_mounted() {
            return;
        }
        notified.await;
    }
}
