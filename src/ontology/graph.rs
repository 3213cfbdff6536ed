use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

use lazy_static::lazy_static;
use tracing::{debug, warn};

use super::record::{TaxonConstraint, TermRecord};
use super::{load_obo, load_owl, normalize_id};
use crate::annotations::goa;
use crate::error::StatsError;
use crate::reader::logical_extension;

pub const MF_ROOT: &str = "GO_0003674";
pub const BP_ROOT: &str = "GO_0008150";
pub const CC_ROOT: &str = "GO_0005575";

lazy_static! {
    static ref ROOTS: HashSet<&'static str> = [MF_ROOT, BP_ROOT, CC_ROOT].into_iter().collect();

    static ref NAMESPACE_ROOTS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("molecular_function", MF_ROOT);
        m.insert("biological_process", BP_ROOT);
        m.insert("cellular_component", CC_ROOT);
        m
    };

    /// Short sub-ontology tags accepted wherever a namespace argument is
    /// taken, next to the three full names.
    static ref NAMESPACE_ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("BPO", "biological_process");
        m.insert("B", "biological_process");
        m.insert("P", "biological_process");
        m.insert("MFO", "molecular_function");
        m.insert("M", "molecular_function");
        m.insert("F", "molecular_function");
        m.insert("CCO", "cellular_component");
        m.insert("C", "cellular_component");
        m
    };

    static ref DEFAULT_VALID_EDGES: [&'static str; 8] = [
        "is a",
        "part of",
        "regulates",
        "positively regulates",
        "negatively regulates",
        "occurs in",
        "capable of",
        "capable of part of",
    ];

    static ref DEFAULT_VALID_EVIDENCE: [&'static str; 8] =
        ["EXP", "IDA", "IPI", "IMP", "IGI", "IEP", "TAS", "IC"];
}

/// Construction-time knobs. Defaults match a plain frequency pipeline:
/// the eight is-a-like relation labels count as transitive and every
/// evidence code except `ND`/`NR` contributes to the corpus.
#[derive(Debug, Clone)]
pub struct OntologyOptions {
    /// Base URI for the axiom-based format; required for `.owl` input.
    pub namespace_uri: Option<String>,
    /// Restrict corpus propagation and simGIC closures to same-namespace,
    /// valid-relation edges.
    pub by_ontology: bool,
    /// When false, corpus rows must carry an evidence code from
    /// `valid_evidence`.
    pub use_all_evidence: bool,
    pub valid_evidence: HashSet<String>,
    pub valid_edges: HashSet<String>,
}

impl Default for OntologyOptions {
    fn default() -> Self {
        OntologyOptions {
            namespace_uri: None,
            by_ontology: false,
            use_all_evidence: true,
            valid_evidence: DEFAULT_VALID_EVIDENCE.iter().map(|s| s.to_string()).collect(),
            valid_edges: DEFAULT_VALID_EDGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl OntologyOptions {
    pub fn with_namespace_uri(mut self, uri: impl Into<String>) -> Self {
        self.namespace_uri = Some(uri.into());
        self
    }

    pub fn with_by_ontology(mut self, by_ontology: bool) -> Self {
        self.by_ontology = by_ontology;
        self
    }
}

/// Identity card of a live term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDetails {
    pub id: String,
    pub name: String,
    pub descr: String,
    pub namespace: String,
}

/// Value side of the parent/children/ancestor/descendant query maps: how
/// the returned term relates to the walk plus its identity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDetails {
    pub relation: String,
    pub name: String,
    pub descr: String,
    pub namespace: String,
}

/// Terminal state of an obsolete term's replacement chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObsoleteTarget {
    Replaced(String),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IcEntry {
    pub term: String,
    pub namespace: String,
    pub ic: f64,
}

/// Full edge tuple kept in both symmetric indices, so id-only traversal and
/// full-metadata retrieval are both single lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Edge {
    id: String,
    relation: String,
    namespace: String,
    name: String,
    descr: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeFilters {
    same_namespace: bool,
    valid_edges_only: bool,
}

const NS_FILTER: EdgeFilters = EdgeFilters {
    same_namespace: true,
    valid_edges_only: false,
};
const EDGE_FILTER: EdgeFilters = EdgeFilters {
    same_namespace: false,
    valid_edges_only: true,
};
const BOTH_FILTERS: EdgeFilters = EdgeFilters {
    same_namespace: true,
    valid_edges_only: true,
};

/// In-memory GO multigraph: one instance per loaded ontology, read-only
/// once built, shareable across threads.
#[derive(Debug)]
pub struct OntologyGraph {
    options: OntologyOptions,
    /// Live terms only; obsolete terms are excluded from every index.
    details: HashMap<String, TermDetails>,
    /// Every parsed record, obsolete included.
    records: HashMap<String, TermRecord>,
    son_father: HashMap<String, HashSet<Edge>>,
    father_son: HashMap<String, HashSet<Edge>>,
    son_father_ids: HashMap<String, HashSet<String>>,
    father_son_ids: HashMap<String, HashSet<String>>,
    secondary_to_primary: HashMap<String, String>,
    primary_to_secondary: HashMap<String, HashSet<String>>,
    obsolete: HashMap<String, BTreeSet<ObsoleteTarget>>,
    constraints: HashMap<String, Vec<TaxonConstraint>>,
    ic_by_term: HashMap<String, f64>,
    /// Sorted by (ic, term) for range queries.
    ic_index: Vec<IcEntry>,
}

impl OntologyGraph {
    /// Loads an ontology, picking the loader from the file extension
    /// (`.obo` or `.owl`, optionally gzipped). OWL input needs
    /// [`OntologyOptions::namespace_uri`]; use [`Self::with_options`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        Self::with_options(path, OntologyOptions::default())
    }

    pub fn with_options(
        path: impl AsRef<Path>,
        options: OntologyOptions,
    ) -> Result<Self, StatsError> {
        let path = path.as_ref();
        let records = match logical_extension(path).as_str() {
            "obo" => load_obo(path)?,
            "owl" => {
                let uri = options
                    .namespace_uri
                    .as_deref()
                    .ok_or(StatsError::NamespaceRequired)?;
                load_owl(path, uri)?
            }
            other => return Err(StatsError::UnsupportedExtension(other.to_string())),
        };
        Self::from_records(records, options)
    }

    /// Loads the ontology and immediately computes information content from
    /// the given annotation corpus.
    pub fn with_corpus(
        path: impl AsRef<Path>,
        goa_path: impl AsRef<Path>,
        options: OntologyOptions,
    ) -> Result<Self, StatsError> {
        let mut graph = Self::with_options(path, options)?;
        graph.compute_information_content(goa_path)?;
        Ok(graph)
    }

    /// Builds the graph from an already-normalized record table (the two
    /// format loaders and the cache module all produce this).
    pub fn from_records(
        records: Vec<TermRecord>,
        options: OntologyOptions,
    ) -> Result<Self, StatsError> {
        let mut graph = OntologyGraph {
            options,
            details: HashMap::new(),
            records: HashMap::new(),
            son_father: HashMap::new(),
            father_son: HashMap::new(),
            son_father_ids: HashMap::new(),
            father_son_ids: HashMap::new(),
            secondary_to_primary: HashMap::new(),
            primary_to_secondary: HashMap::new(),
            obsolete: HashMap::new(),
            constraints: HashMap::new(),
            ic_by_term: HashMap::new(),
            ic_index: Vec::new(),
        };

        for record in records {
            graph.records.entry(record.id.clone()).or_insert(record);
        }

        // Pass 1: register live terms, aliases, constraints; seed indices.
        for (id, record) in &graph.records {
            if record.is_obsolete {
                continue;
            }
            graph.details.insert(
                id.clone(),
                TermDetails {
                    id: id.clone(),
                    name: record.name.clone(),
                    descr: record.descr.clone(),
                    namespace: record.namespace.clone(),
                },
            );
            for alt in &record.alt_ids {
                graph
                    .secondary_to_primary
                    .insert(alt.clone(), id.clone());
                graph
                    .primary_to_secondary
                    .entry(id.clone())
                    .or_default()
                    .insert(alt.clone());
            }
            if !record.taxon_constraints.is_empty() {
                graph
                    .constraints
                    .insert(id.clone(), record.taxon_constraints.clone());
            }
            graph.son_father.entry(id.clone()).or_default();
            graph.father_son.entry(id.clone()).or_default();
            graph.son_father_ids.entry(id.clone()).or_default();
            graph.father_son_ids.entry(id.clone()).or_default();
        }

        // Pass 2: symmetric edge tables, both full-tuple and id-only.
        let mut edges: Vec<(String, String, String)> = Vec::new();
        for (id, record) in &graph.records {
            if record.is_obsolete {
                continue;
            }
            for edge in &record.parents {
                edges.push((id.clone(), edge.parent.clone(), edge.relation.clone()));
            }
        }
        for (son, father, relation) in edges {
            let Some(father_details) = graph.records.get(&father) else {
                return Err(StatsError::malformed(
                    "ontology",
                    "<records>",
                    0,
                    format!("term {son} cites undefined father {father}"),
                ));
            };
            if father_details.is_obsolete {
                warn!(%son, %father, "dropping edge to obsolete father");
                continue;
            }
            let son_details = &graph.records[&son];
            graph.son_father.entry(son.clone()).or_default().insert(Edge {
                id: father.clone(),
                relation: relation.clone(),
                namespace: father_details.namespace.clone(),
                name: father_details.name.clone(),
                descr: father_details.descr.clone(),
            });
            graph
                .son_father_ids
                .entry(son.clone())
                .or_default()
                .insert(father.clone());
            graph.father_son.entry(father.clone()).or_default().insert(Edge {
                id: son.clone(),
                relation,
                namespace: son_details.namespace.clone(),
                name: son_details.name.clone(),
                descr: son_details.descr.clone(),
            });
            graph
                .father_son_ids
                .entry(father)
                .or_default()
                .insert(son);
        }

        graph.collapse_obsolete();

        if let Some(member) = graph.find_parent_cycle() {
            return Err(StatsError::CyclicOntology { member });
        }

        debug!(
            live = graph.details.len(),
            obsolete = graph.obsolete.len(),
            aliases = graph.secondary_to_primary.len(),
            "ontology graph built"
        );
        Ok(graph)
    }

    /// Collapses `consider` chains transitively: each obsolete term ends up
    /// pointing at live terms, or at `Delete` when a branch dead-ends in a
    /// root, a cycle, a dangling id, or a term explicitly marked deleted.
    fn collapse_obsolete(&mut self) {
        let mut raw: HashMap<String, Vec<String>> = HashMap::new();
        for (id, record) in &self.records {
            if !record.is_obsolete {
                continue;
            }
            let deleted_by_comment = record
                .comment
                .as_deref()
                .is_some_and(|c| c.contains("deleted"))
                && record.consider.is_empty();
            let targets = if deleted_by_comment {
                Vec::new()
            } else {
                record.consider.clone()
            };
            raw.insert(id.clone(), targets);
        }

        for (id, targets) in &raw {
            let mut resolved: BTreeSet<ObsoleteTarget> = BTreeSet::new();
            let mut visited: HashSet<&str> = HashSet::from([id.as_str()]);
            let mut stack: Vec<&String> = targets.iter().collect();
            while let Some(target) = stack.pop() {
                if ROOTS.contains(target.as_str()) {
                    resolved.insert(ObsoleteTarget::Delete);
                } else if self.details.contains_key(target) {
                    resolved.insert(ObsoleteTarget::Replaced(target.clone()));
                } else if let Some(next) = raw.get(target) {
                    if visited.insert(target) {
                        stack.extend(next);
                    } else {
                        resolved.insert(ObsoleteTarget::Delete);
                    }
                } else {
                    resolved.insert(ObsoleteTarget::Delete);
                }
            }
            if resolved.is_empty() {
                resolved.insert(ObsoleteTarget::Delete);
            }
            self.obsolete.insert(id.clone(), resolved);
        }
    }

    /// Iterative three-color DFS over the son->father id index. The
    /// memory-less propagation walks every parent path, so a cycle in this
    /// index would never terminate; bad reference data is rejected outright.
    fn find_parent_cycle(&self) -> Option<String> {
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let mut state: HashMap<&str, u8> = HashMap::new();
        for start in self.son_father_ids.keys() {
            if state.contains_key(start.as_str()) {
                continue;
            }
            let mut stack: Vec<(&str, bool)> = vec![(start.as_str(), false)];
            while let Some((node, children_done)) = stack.pop() {
                if children_done {
                    state.insert(node, BLACK);
                    continue;
                }
                if state.contains_key(node) {
                    continue;
                }
                state.insert(node, GRAY);
                stack.push((node, true));
                for father in self.son_father_ids.get(node).into_iter().flatten() {
                    match state.get(father.as_str()) {
                        Some(&GRAY) => return Some(father.clone()),
                        Some(&BLACK) => {}
                        _ => stack.push((father.as_str(), false)),
                    }
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    //  Identity and listing
    // ------------------------------------------------------------------

    /// Normalizes an externally supplied id and resolves it through the
    /// secondary-id map. Every public query goes through this first.
    fn canonical(&self, id: &str) -> String {
        let normalized = normalize_id(id);
        match self.secondary_to_primary.get(&normalized) {
            Some(primary) => primary.clone(),
            None => normalized,
        }
    }

    pub fn options(&self) -> &OntologyOptions {
        &self.options
    }

    /// Identity card for a live term, or `None` for unknown/obsolete ids.
    pub fn term_details(&self, id: &str) -> Option<TermDetails> {
        self.details.get(&self.canonical(id)).cloned()
    }

    /// Raw parsed record, obsolete terms included.
    pub fn record(&self, id: &str) -> Option<&TermRecord> {
        self.records.get(&self.canonical(id))
    }

    pub fn term_count(&self) -> usize {
        self.details.len()
    }

    /// All live term ids, sorted.
    pub fn term_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.details.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn terms_by_namespace(&self, namespace: &str) -> HashSet<String> {
        let Some(namespace) = resolve_namespace(namespace) else {
            return HashSet::new();
        };
        self.details
            .values()
            .filter(|d| d.namespace == namespace)
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn terms_by_namespace_without_root(&self, namespace: &str) -> HashSet<String> {
        let mut terms = self.terms_by_namespace(namespace);
        for root in ROOTS.iter() {
            terms.remove(*root);
        }
        terms
    }

    /// Terms no other term cites as father.
    pub fn leaves(&self) -> HashSet<String> {
        self.father_son_ids
            .iter()
            .filter(|(_, sons)| sons.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn leaves_by_namespace(&self, namespace: &str) -> HashSet<String> {
        let Some(namespace) = resolve_namespace(namespace) else {
            return HashSet::new();
        };
        self.leaves()
            .into_iter()
            .filter(|id| {
                self.details
                    .get(id)
                    .is_some_and(|d| d.namespace == namespace)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    //  Secondary ids and obsolescence
    // ------------------------------------------------------------------

    pub fn secondary_ids(&self) -> &HashMap<String, String> {
        &self.secondary_to_primary
    }

    pub fn is_secondary_id(&self, id: &str) -> bool {
        self.secondary_to_primary.contains_key(&normalize_id(id))
    }

    pub fn primary_from_secondary(&self, id: &str) -> Option<&str> {
        self.secondary_to_primary
            .get(&normalize_id(id))
            .map(String::as_str)
    }

    pub fn secondary_ids_of(&self, id: &str) -> HashSet<String> {
        self.primary_to_secondary
            .get(&self.canonical(id))
            .cloned()
            .unwrap_or_default()
    }

    /// Obsolete terms with their transitively collapsed replacement sets.
    pub fn obsolete_map(&self) -> &HashMap<String, BTreeSet<ObsoleteTarget>> {
        &self.obsolete
    }

    // ------------------------------------------------------------------
    //  Direct neighbours, four filter combinations each
    // ------------------------------------------------------------------

    pub fn parents(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.son_father, id, EdgeFilters::default())
    }

    pub fn parents_by_namespace(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.son_father, id, NS_FILTER)
    }

    pub fn parents_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.son_father, id, EDGE_FILTER)
    }

    pub fn parents_by_namespace_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.son_father, id, BOTH_FILTERS)
    }

    pub fn children(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.father_son, id, EdgeFilters::default())
    }

    pub fn children_by_namespace(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.father_son, id, NS_FILTER)
    }

    pub fn children_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.father_son, id, EDGE_FILTER)
    }

    pub fn children_by_namespace_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.direct(&self.father_son, id, BOTH_FILTERS)
    }

    /// Direct father ids of a term.
    pub fn parent_ids(&self, id: &str) -> HashSet<String> {
        self.son_father_ids
            .get(&self.canonical(id))
            .cloned()
            .unwrap_or_default()
    }

    /// Direct son ids of a term.
    pub fn child_ids(&self, id: &str) -> HashSet<String> {
        self.father_son_ids
            .get(&self.canonical(id))
            .cloned()
            .unwrap_or_default()
    }

    /// The whole son->father id index.
    pub fn son_father_ids(&self) -> &HashMap<String, HashSet<String>> {
        &self.son_father_ids
    }

    /// The whole father->son id index.
    pub fn father_son_ids(&self) -> &HashMap<String, HashSet<String>> {
        &self.father_son_ids
    }

    fn edge_passes(&self, edge: &Edge, namespace: Option<&str>, filters: EdgeFilters) -> bool {
        if filters.same_namespace && Some(edge.namespace.as_str()) != namespace {
            return false;
        }
        if filters.valid_edges_only && !self.options.valid_edges.contains(&edge.relation) {
            return false;
        }
        true
    }

    fn direct(
        &self,
        index: &HashMap<String, HashSet<Edge>>,
        id: &str,
        filters: EdgeFilters,
    ) -> HashMap<String, EdgeDetails> {
        let key = self.canonical(id);
        let Some(edges) = index.get(&key) else {
            return HashMap::new();
        };
        let namespace = self.details.get(&key).map(|d| d.namespace.clone());
        edges
            .iter()
            .filter(|e| self.edge_passes(e, namespace.as_deref(), filters))
            .map(|e| (e.id.clone(), edge_details(e)))
            .collect()
    }

    // ------------------------------------------------------------------
    //  Transitive closures, four filter combinations each
    // ------------------------------------------------------------------

    pub fn ancestors(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.son_father, id, EdgeFilters::default())
    }

    pub fn ancestors_by_namespace(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.son_father, id, NS_FILTER)
    }

    pub fn ancestors_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.son_father, id, EDGE_FILTER)
    }

    pub fn ancestors_by_namespace_with_valid_edges(
        &self,
        id: &str,
    ) -> HashMap<String, EdgeDetails> {
        self.closure(&self.son_father, id, BOTH_FILTERS)
    }

    pub fn descendants(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.father_son, id, EdgeFilters::default())
    }

    pub fn descendants_by_namespace(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.father_son, id, NS_FILTER)
    }

    pub fn descendants_with_valid_edges(&self, id: &str) -> HashMap<String, EdgeDetails> {
        self.closure(&self.father_son, id, EDGE_FILTER)
    }

    pub fn descendants_by_namespace_with_valid_edges(
        &self,
        id: &str,
    ) -> HashMap<String, EdgeDetails> {
        self.closure(&self.father_son, id, BOTH_FILTERS)
    }

    /// Breadth-first transitive closure. The namespace filter compares
    /// against the starting term's namespace; a branch stops as soon as a
    /// node is revisited.
    fn closure(
        &self,
        index: &HashMap<String, HashSet<Edge>>,
        id: &str,
        filters: EdgeFilters,
    ) -> HashMap<String, EdgeDetails> {
        let start = self.canonical(id);
        if !index.contains_key(&start) {
            return HashMap::new();
        }
        let namespace = self.details.get(&start).map(|d| d.namespace.clone());

        let mut done: HashMap<String, EdgeDetails> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let Some(edges) = index.get(&current) else {
                continue;
            };
            for edge in edges {
                if done.contains_key(&edge.id)
                    || !self.edge_passes(edge, namespace.as_deref(), filters)
                {
                    continue;
                }
                done.insert(edge.id.clone(), edge_details(edge));
                queue.push_back(edge.id.clone());
            }
        }
        done
    }

    // ------------------------------------------------------------------
    //  Distance-bucketed neighbourhood
    // ------------------------------------------------------------------

    pub fn distance_bucketed_neighborhood(&self, id: &str, d: i32) -> HashSet<String> {
        self.neighborhood(id, d, EdgeFilters::default(), true)
    }

    pub fn distance_bucketed_neighborhood_by_namespace(
        &self,
        id: &str,
        d: i32,
    ) -> HashSet<String> {
        self.neighborhood(id, d, NS_FILTER, true)
    }

    pub fn distance_bucketed_neighborhood_with_valid_edges(
        &self,
        id: &str,
        d: i32,
    ) -> HashSet<String> {
        self.neighborhood(id, d, EDGE_FILTER, true)
    }

    /// Fully filtered variant; walks only father edges unless `descend`.
    pub fn distance_bucketed_neighborhood_by_namespace_with_valid_edges(
        &self,
        id: &str,
        d: i32,
        descend: bool,
    ) -> HashSet<String> {
        self.neighborhood(id, d, BOTH_FILTERS, descend)
    }

    /// BFS outward up to depth `d` over the union of father and (when
    /// `descend`) son edges. Unlike [`Self::closure`], the namespace filter
    /// here compares each hop against the namespace of the node being
    /// expanded.
    fn neighborhood(&self, id: &str, d: i32, filters: EdgeFilters, descend: bool) -> HashSet<String> {
        let start = self.canonical(id);
        let mut result: HashSet<String> = HashSet::from([start.clone()]);
        if d <= 0 {
            return result;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: Vec<String> = vec![start];
        for _ in 0..d {
            let mut next: Vec<String> = Vec::new();
            for node in frontier {
                if !visited.insert(node.clone()) {
                    continue;
                }
                let mut new_nodes = self.step_ids(&self.son_father, &node, filters);
                if descend {
                    new_nodes.extend(self.step_ids(&self.father_son, &node, filters));
                }
                for found in new_nodes {
                    result.insert(found.clone());
                    next.push(found);
                }
            }
            frontier = next;
        }
        result
    }

    /// One filtered hop from an already-canonical node, judged against that
    /// node's own namespace.
    fn step_ids(
        &self,
        index: &HashMap<String, HashSet<Edge>>,
        node: &str,
        filters: EdgeFilters,
    ) -> HashSet<String> {
        let Some(edges) = index.get(node) else {
            return HashSet::new();
        };
        let namespace = self.details.get(node).map(|d| d.namespace.as_str());
        edges
            .iter()
            .filter(|e| self.edge_passes(e, namespace, filters))
            .map(|e| e.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    //  Cumulative frequency propagation
    // ------------------------------------------------------------------

    /// Memory-aware prior: every term weighs 1, and each term's weight is
    /// added once to every distinct ancestor, as if redundant paths
    /// collapsed into a hierarchy.
    pub fn cumulative_freq_prior(&self) -> HashMap<String, u64> {
        let mut cumulative: HashMap<String, u64> =
            self.details.keys().map(|id| (id.clone(), 1)).collect();
        for start in self.details.keys() {
            self.propagate_memory_aware(start, 1, &mut cumulative);
        }
        cumulative
    }

    /// Memory-aware corpus propagation over observed usage counts.
    pub fn cumulative_freq_corpus(&self, usage: &HashMap<String, u64>) -> HashMap<String, u64> {
        let mut cumulative: HashMap<String, u64> = self
            .details
            .keys()
            .map(|id| (id.clone(), usage.get(id).copied().unwrap_or(0)))
            .collect();
        for start in self.details.keys() {
            let add = usage.get(start).copied().unwrap_or(0);
            self.propagate_memory_aware(start, add, &mut cumulative);
        }
        cumulative
    }

    /// Memory-less prior: every distinct path contributes independently, so
    /// an ancestor reachable along two paths is counted twice.
    pub fn cumulative_freq_prior_ml(&self) -> HashMap<String, u64> {
        let mut cumulative: HashMap<String, u64> =
            self.details.keys().map(|id| (id.clone(), 1)).collect();
        for start in self.details.keys() {
            self.propagate_memory_less(start, 1, &mut cumulative);
        }
        cumulative
    }

    /// Memory-less corpus propagation.
    pub fn cumulative_freq_corpus_ml(&self, usage: &HashMap<String, u64>) -> HashMap<String, u64> {
        let mut cumulative: HashMap<String, u64> = self
            .details
            .keys()
            .map(|id| (id.clone(), usage.get(id).copied().unwrap_or(0)))
            .collect();
        for start in self.details.keys() {
            let add = usage.get(start).copied().unwrap_or(0);
            self.propagate_memory_less(start, add, &mut cumulative);
        }
        cumulative
    }

    /// Memory-less corpus propagation restricted to same-namespace,
    /// valid-relation edges (namespace judged from each walk's start term).
    pub fn cumulative_freq_corpus_ml_by_namespace(
        &self,
        usage: &HashMap<String, u64>,
    ) -> HashMap<String, u64> {
        let mut cumulative: HashMap<String, u64> = self
            .details
            .keys()
            .map(|id| (id.clone(), usage.get(id).copied().unwrap_or(0)))
            .collect();
        for start in self.details.keys() {
            let start = start.as_str();
            let add = usage.get(start).copied().unwrap_or(0);
            let namespace = self.details.get(start).map(|d| d.namespace.clone());
            let mut queue: VecDeque<&str> = VecDeque::from([start]);
            while let Some(vertex) = queue.pop_front() {
                if vertex != start {
                    *cumulative.entry(vertex.to_string()).or_insert(0) += add;
                }
                for edge in self.son_father.get(vertex).into_iter().flatten() {
                    if self.edge_passes(edge, namespace.as_deref(), BOTH_FILTERS) {
                        queue.push_back(&edge.id);
                    }
                }
            }
        }
        cumulative
    }

    fn propagate_memory_aware(
        &self,
        start: &str,
        add: u64,
        cumulative: &mut HashMap<String, u64>,
    ) {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        while let Some(vertex) = queue.pop_front() {
            if !visited.insert(vertex) {
                continue;
            }
            if vertex != start {
                *cumulative.entry(vertex.to_string()).or_insert(0) += add;
            }
            for father in self.son_father_ids.get(vertex).into_iter().flatten() {
                if !visited.contains(father.as_str()) {
                    queue.push_back(father);
                }
            }
        }
    }

    fn propagate_memory_less(&self, start: &str, add: u64, cumulative: &mut HashMap<String, u64>) {
        // Termination is guaranteed by the construction-time cycle check.
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        while let Some(vertex) = queue.pop_front() {
            if vertex != start {
                *cumulative.entry(vertex.to_string()).or_insert(0) += add;
            }
            for father in self.son_father_ids.get(vertex).into_iter().flatten() {
                queue.push_back(father);
            }
        }
    }

    // ------------------------------------------------------------------
    //  Information content
    // ------------------------------------------------------------------

    /// Parses the annotation corpus, runs memory-less corpus propagation
    /// (namespace-restricted when `by_ontology` is set), and scores every
    /// term as `-ln((freq + 1) / (root_freq + 1))` against its namespace
    /// root.
    pub fn compute_information_content(
        &mut self,
        goa_path: impl AsRef<Path>,
    ) -> Result<(), StatsError> {
        let raw = goa::parse_usage_counts(
            goa_path.as_ref(),
            self.options.use_all_evidence,
            &self.options.valid_evidence,
        )?;
        let mut usage: HashMap<String, u64> = HashMap::new();
        for (id, count) in raw {
            *usage.entry(self.canonical(&id)).or_insert(0) += count;
        }

        let cumulative = if self.options.by_ontology {
            self.cumulative_freq_corpus_ml_by_namespace(&usage)
        } else {
            self.cumulative_freq_corpus_ml(&usage)
        };

        self.ic_by_term.clear();
        self.ic_index.clear();
        let mut missing_roots: HashSet<String> = HashSet::new();
        for (id, freq) in &cumulative {
            let Some(details) = self.details.get(id) else {
                continue;
            };
            let Some(root) = NAMESPACE_ROOTS.get(details.namespace.as_str()) else {
                continue;
            };
            let Some(root_freq) = cumulative.get(*root) else {
                if missing_roots.insert(details.namespace.clone()) {
                    warn!(
                        namespace = %details.namespace,
                        root = *root,
                        "namespace root missing from graph; its terms get no IC"
                    );
                }
                continue;
            };
            let ic = -(((freq + 1) as f64) / ((root_freq + 1) as f64)).ln();
            self.ic_by_term.insert(id.clone(), ic);
            self.ic_index.push(IcEntry {
                term: id.clone(),
                namespace: details.namespace.clone(),
                ic,
            });
        }
        self.ic_index.sort_by(|a, b| {
            a.ic
                .partial_cmp(&b.ic)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.term.cmp(&b.term))
        });

        debug!(scored = self.ic_by_term.len(), "information content computed");
        Ok(())
    }

    /// Information content of a term; 0.0 when unknown or not yet computed.
    pub fn ic(&self, id: &str) -> f64 {
        self.ic_by_term
            .get(&self.canonical(id))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn ic_map(&self) -> &HashMap<String, f64> {
        &self.ic_by_term
    }

    /// Terms with `low <= ic <= high`, ascending by IC.
    pub fn terms_with_ic_in_range(&self, low: f64, high: f64) -> Vec<IcEntry> {
        let from = self.ic_index.partition_point(|e| e.ic < low);
        self.ic_index[from..]
            .iter()
            .take_while(|e| e.ic <= high)
            .cloned()
            .collect()
    }

    pub fn terms_by_namespace_with_ic_in_range(
        &self,
        namespace: &str,
        low: f64,
        high: f64,
    ) -> Vec<IcEntry> {
        let Some(namespace) = resolve_namespace(namespace) else {
            return Vec::new();
        };
        self.terms_with_ic_in_range(low, high)
            .into_iter()
            .filter(|e| e.namespace == namespace)
            .collect()
    }

    /// IC-weighted Jaccard similarity over the two terms' ancestor closures
    /// (terms themselves included). Requires information content to have
    /// been computed; 0.0 when the union carries no IC mass.
    pub fn simgic(&self, a: &str, b: &str) -> f64 {
        let closure = |id: &str| -> HashSet<String> {
            let ancestors = if self.options.by_ontology {
                self.ancestors_by_namespace_with_valid_edges(id)
            } else {
                self.ancestors(id)
            };
            let mut set: HashSet<String> = ancestors.into_keys().collect();
            set.insert(self.canonical(id));
            set
        };
        let set_a = closure(a);
        let set_b = closure(b);

        let intersection: f64 = set_a
            .intersection(&set_b)
            .filter_map(|id| self.ic_by_term.get(id))
            .sum();
        let union: f64 = set_a
            .union(&set_b)
            .filter_map(|id| self.ic_by_term.get(id))
            .sum();
        if union == 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    // ------------------------------------------------------------------
    //  Taxon constraints
    // ------------------------------------------------------------------

    /// Structured taxon-applicability restrictions of a term. Populated
    /// only by the axiom-based loader; always empty for stanza input.
    pub fn taxon_constraints(&self, id: &str) -> Vec<TaxonConstraint> {
        self.constraints
            .get(&self.canonical(id))
            .cloned()
            .unwrap_or_default()
    }
}

fn edge_details(edge: &Edge) -> EdgeDetails {
    EdgeDetails {
        relation: edge.relation.clone(),
        name: edge.name.clone(),
        descr: edge.descr.clone(),
        namespace: edge.namespace.clone(),
    }
}

fn resolve_namespace(namespace: &str) -> Option<&'static str> {
    let upper = namespace.trim().to_uppercase();
    if let Some(full) = NAMESPACE_ALIASES.get(upper.as_str()) {
        return Some(*full);
    }
    NAMESPACE_ROOTS
        .get_key_value(namespace.trim())
        .map(|(k, _)| *k)
}
