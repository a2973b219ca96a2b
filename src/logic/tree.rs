use crate::api::{ApiClient, ApiError, ApiResult, RelatedParams};
use crate::model::{Eid, Entity, EntityRef};
use crate::store::InFlight;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// One node of the content tree.
///
/// `children` is `None` until fetched; once fetched it is the complete,
/// server-ordered list of child eids, all present in the node table.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub eid: Eid,
    pub title: String,
    pub cw_etype: String,
    pub children: Option<Vec<Eid>>,
    pub isleaf: bool,
}

impl TreeNode {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.eid, self.cw_etype.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Collapsed,
    Fetching,
    Expanded,
}

/// Progress of the last reparenting of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    Pending,
    Committed,
    Failed,
}

/// Server side of the tree: node loading and reparenting.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn fetch_node(&self, eid: Eid) -> ApiResult<Entity>;
    async fn fetch_children(&self, node: &EntityRef) -> ApiResult<Vec<Entity>>;
    /// Reparent `node` under `new_parent`, appending it to the parent's children.
    async fn move_node(&self, node: Eid, new_parent: &EntityRef) -> ApiResult<()>;
}

/// [`TreeSource`] backed by the CMS section endpoints.
#[derive(Debug, Clone)]
pub struct ApiTreeSource {
    api: ApiClient,
}

impl ApiTreeSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TreeSource for ApiTreeSource {
    async fn fetch_node(&self, eid: Eid) -> ApiResult<Entity> {
        self.api.get_entity("section", eid).await
    }

    async fn fetch_children(&self, node: &EntityRef) -> ApiResult<Vec<Entity>> {
        self.api
            .get_related(&node.cw_etype, node.eid, "children", &RelatedParams::default())
            .await
    }

    async fn move_node(&self, node: Eid, new_parent: &EntityRef) -> ApiResult<()> {
        let doc = self.api.move_section(new_parent.eid, node).await?;
        if doc.has_errors() {
            return Err(ApiError::Rejected(doc.errors()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: HashMap<Eid, TreeNode>,
    top: Vec<Eid>,
    expanded: HashSet<Eid>,
    fetching: HashSet<Eid>,
    moves: HashMap<Eid, MoveState>,
    /// Per parent, bumped whenever a move edits its child list.
    revisions: HashMap<Eid, u64>,
    /// Latest fetch issued per node; older responses are dropped.
    fetch_tickets: HashMap<Eid, u64>,
    next_ticket: u64,
}

impl TreeState {
    /// Insert fetched children, keeping records already in the table, and
    /// replace the parent's child list with the fresh ordering.
    fn merge_children(&mut self, parent: Eid, children: Vec<TreeNode>) -> Vec<Eid> {
        let eids: Vec<Eid> = children.iter().map(|child| child.eid).collect();
        for child in children {
            self.nodes.entry(child.eid).or_insert(child);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = Some(eids.clone());
        }
        eids
    }

    fn revision(&self, eid: Eid) -> u64 {
        self.revisions.get(&eid).copied().unwrap_or(0)
    }

    fn is_descendant(&self, ancestor: Eid, candidate: Eid) -> bool {
        let mut queue: VecDeque<Eid> = VecDeque::from([ancestor]);
        let mut seen = HashSet::new();
        while let Some(eid) = queue.pop_front() {
            if !seen.insert(eid) {
                continue;
            }
            let Some(children) = self.nodes.get(&eid).and_then(|node| node.children.as_ref()) else {
                continue;
            };
            for &child in children {
                if child == candidate {
                    return true;
                }
                queue.push_back(child);
            }
        }
        false
    }
}

/// Partially loaded content tree.
///
/// The node table is owned here; views hold eids and re-render when
/// [`version`](Self::version) changes. Locks are never held across a network
/// call, so concurrent operations interleave only between suspension points.
pub struct EntityTree<S> {
    source: S,
    branch_types: Vec<String>,
    state: Mutex<TreeState>,
    pinning: InFlight<Eid>,
    version: AtomicU64,
}

impl<S: TreeSource> EntityTree<S> {
    pub fn new(source: S, branch_types: Vec<String>) -> Self {
        Self {
            source,
            branch_types,
            state: Mutex::new(TreeState::default()),
            pinning: InFlight::new(),
            version: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Incremented on every change a view may need to render.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn to_node(&self, entity: &Entity) -> TreeNode {
        TreeNode {
            eid: entity.eid,
            title: entity.display_title().to_string(),
            cw_etype: entity.cw_etype.clone(),
            children: None,
            isleaf: !self.branch_types.iter().any(|etype| *etype == entity.cw_etype),
        }
    }

    /// Add `entity` to the table unless a node with its eid is already there.
    pub fn insert(&self, entity: &Entity) -> bool {
        let node = self.to_node(entity);
        let inserted = {
            let mut state = self.state.lock();
            match state.nodes.entry(node.eid) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(node);
                    true
                }
            }
        };
        if inserted {
            self.bump();
        }
        inserted
    }

    /// Load the top-level nodes, then expand every visible node listed in
    /// `ancestors` so the path to the current entity is open.
    pub async fn bootstrap(&self, top: &[Eid], ancestors: &[Eid]) -> ApiResult<()> {
        for &eid in top {
            let entity = self.source.fetch_node(eid).await?;
            self.insert(&entity);
        }
        self.state.lock().top = top.to_vec();
        self.bump();

        let ancestors: HashSet<Eid> = ancestors.iter().copied().collect();
        let mut queue: VecDeque<Eid> = top.iter().copied().collect();
        while let Some(eid) = queue.pop_front() {
            if !ancestors.contains(&eid) {
                continue;
            }
            let children = self.expand(eid).await?;
            queue.extend(children);
        }
        Ok(())
    }

    pub fn top(&self) -> Vec<Eid> {
        self.state.lock().top.clone()
    }

    pub fn node(&self, eid: Eid) -> Option<TreeNode> {
        self.state.lock().nodes.get(&eid).cloned()
    }

    pub fn children(&self, eid: Eid) -> Option<Vec<Eid>> {
        self.state.lock().nodes.get(&eid).and_then(|node| node.children.clone())
    }

    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_state(&self, eid: Eid) -> NodeState {
        let state = self.state.lock();
        if state.fetching.contains(&eid) {
            NodeState::Fetching
        } else if state.expanded.contains(&eid) {
            NodeState::Expanded
        } else {
            NodeState::Collapsed
        }
    }

    pub fn is_pinning(&self, eid: Eid) -> bool {
        self.pinning.contains(&eid)
    }

    pub fn move_state(&self, eid: Eid) -> MoveState {
        if self.pinning.contains(&eid) {
            return MoveState::Pending;
        }
        self.state
            .lock()
            .moves
            .get(&eid)
            .copied()
            .unwrap_or(MoveState::Idle)
    }

    /// Expand `eid`, fetching its children only if they were never fetched.
    pub async fn expand(&self, eid: Eid) -> ApiResult<Vec<Eid>> {
        let known = {
            let mut state = self.state.lock();
            let node = state
                .nodes
                .get(&eid)
                .ok_or_else(|| ApiError::InvalidOperation(format!("unknown node {}", eid)))?;
            if node.isleaf {
                return Ok(Vec::new());
            }
            let known = node.children.clone();
            state.expanded.insert(eid);
            known
        };
        match known {
            Some(children) => {
                self.bump();
                Ok(children)
            }
            None => self.fetch_children(eid).await,
        }
    }

    /// Re-fetch the children of `eid` even if they are already known.
    pub async fn refresh(&self, eid: Eid) -> ApiResult<Vec<Eid>> {
        self.fetch_children(eid).await
    }

    /// Collapse `eid`. Fetched children stay in the table.
    pub fn collapse(&self, eid: Eid) {
        if self.state.lock().expanded.remove(&eid) {
            self.bump();
        }
    }

    /// Fetch and merge the children of `eid`.
    ///
    /// The response is dropped when a newer fetch of the same node was issued
    /// meanwhile, or when a move edited the node's child list while the
    /// request was in flight: that list already reflects the move and the
    /// response may predate it.
    async fn fetch_children(&self, eid: Eid) -> ApiResult<Vec<Eid>> {
        let (node_ref, ticket, revision) = {
            let mut state = self.state.lock();
            let node_ref = state
                .nodes
                .get(&eid)
                .map(TreeNode::entity_ref)
                .ok_or_else(|| ApiError::InvalidOperation(format!("unknown node {}", eid)))?;
            state.fetching.insert(eid);
            state.expanded.insert(eid);
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.fetch_tickets.insert(eid, ticket);
            (node_ref, ticket, state.revision(eid))
        };
        self.bump();

        let result = self.source.fetch_children(&node_ref).await;
        let outcome = {
            let mut state = self.state.lock();
            if state.fetch_tickets.get(&eid) != Some(&ticket) {
                log::debug!("dropping children of {} overtaken by a newer fetch", node_ref);
                let known = state.nodes.get(&eid).and_then(|node| node.children.clone());
                return result.map(|_| known.unwrap_or_default());
            }
            state.fetch_tickets.remove(&eid);
            state.fetching.remove(&eid);
            match result {
                Ok(_) if state.revision(eid) != revision => {
                    log::debug!("dropping children of {} fetched across a move", node_ref);
                    let known = state.nodes.get(&eid).and_then(|node| node.children.clone());
                    if known.is_none() {
                        state.expanded.remove(&eid);
                    }
                    Ok(known.unwrap_or_default())
                }
                Ok(children) => {
                    let nodes = children.iter().map(|child| self.to_node(child)).collect();
                    Ok(state.merge_children(eid, nodes))
                }
                Err(err) => {
                    state.expanded.remove(&eid);
                    Err(err)
                }
            }
        };
        self.bump();
        if let Err(err) = &outcome {
            log::warn!("fetching children of {} failed: {}", node_ref, err);
        }
        outcome
    }

    /// Reparent `eid` under `new_parent`.
    ///
    /// The node is pinned while the server call runs; a second move of the
    /// same node fails with [`ApiError::Busy`]. On success the node leaves
    /// every child list and is appended to the new parent's list when that
    /// list was fetched. On failure the pin is released and the structure is
    /// left untouched.
    pub async fn move_node(&self, eid: Eid, new_parent: Eid) -> ApiResult<()> {
        if eid == new_parent {
            return Err(ApiError::InvalidOperation(format!("cannot move {} under itself", eid)));
        }
        let parent_ref = {
            let state = self.state.lock();
            let parent = state.nodes.get(&new_parent).ok_or_else(|| {
                ApiError::InvalidOperation(format!("unknown parent {}", new_parent))
            })?;
            if parent.isleaf {
                return Err(ApiError::InvalidOperation(format!("{} cannot hold children", new_parent)));
            }
            if state.is_descendant(eid, new_parent) {
                return Err(ApiError::InvalidOperation(format!(
                    "cannot move {} under its descendant {}",
                    eid, new_parent
                )));
            }
            parent.entity_ref()
        };

        let guard = self.pinning.try_acquire(eid)?;
        self.bump();

        let result = self.source.move_node(eid, &parent_ref).await;
        {
            let mut state = self.state.lock();
            match &result {
                Ok(()) => {
                    let mut edited = vec![new_parent];
                    for node in state.nodes.values_mut() {
                        if let Some(children) = node.children.as_mut() {
                            let before = children.len();
                            children.retain(|child| *child != eid);
                            if children.len() != before {
                                edited.push(node.eid);
                            }
                        }
                    }
                    if let Some(children) = state
                        .nodes
                        .get_mut(&new_parent)
                        .and_then(|parent| parent.children.as_mut())
                    {
                        children.push(eid);
                    }
                    for parent in edited {
                        *state.revisions.entry(parent).or_insert(0) += 1;
                    }
                    state.moves.insert(eid, MoveState::Committed);
                }
                Err(_) => {
                    state.moves.insert(eid, MoveState::Failed);
                }
            }
        }
        drop(guard);
        self.bump();

        if let Err(err) = &result {
            log::warn!("moving {} under {} failed: {}", eid, parent_ref, err);
        }
        result
    }

    /// Visible nodes in display order with their depth: top nodes, then the
    /// children of every expanded node.
    pub fn outline(&self) -> Vec<(usize, TreeNode)> {
        let state = self.state.lock();
        let mut lines = Vec::new();
        let mut stack: Vec<(usize, Eid)> = state.top.iter().rev().map(|eid| (0, *eid)).collect();
        while let Some((depth, eid)) = stack.pop() {
            let Some(node) = state.nodes.get(&eid) else {
                continue;
            };
            lines.push((depth, node.clone()));
            if state.expanded.contains(&eid) {
                if let Some(children) = &node.children {
                    stack.extend(children.iter().rev().map(|child| (depth + 1, *child)));
                }
            }
        }
        lines
    }
}
