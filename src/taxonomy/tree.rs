use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::StatsError;
use crate::reader::open_text;

/// The taxonomy root; every ancestor walk terminates here.
pub const ROOT_TAXON: &str = "1";

/// NCBI taxonomy engine built from the nodes/merged/names dump files.
/// Read-only after construction; the bulk ancestor/descendant tables are
/// built lazily on first use and cached.
#[derive(Debug)]
pub struct TaxonomyTree {
    son_father: HashMap<String, String>,
    father_son: HashMap<String, Vec<String>>,
    rank_of: HashMap<String, String>,
    valid_ranks: HashSet<String>,
    merged: HashMap<String, String>,
    name_to_ids: BTreeMap<String, HashSet<String>>,
    id_to_names: HashMap<String, BTreeSet<(String, String)>>,
    valid_name_classes: HashSet<String>,
    ancestors_cache: OnceLock<HashMap<String, HashSet<String>>>,
    descendants_cache: OnceLock<HashMap<String, HashSet<String>>>,
}

impl TaxonomyTree {
    /// Parses `nodes.dmp`, `merged.dmp` and `names.dmp`. Structurally
    /// unparsable lines are fatal; reference data cannot be locally
    /// repaired.
    pub fn from_dumps(
        nodes_path: impl AsRef<Path>,
        merged_path: impl AsRef<Path>,
        names_path: impl AsRef<Path>,
    ) -> Result<Self, StatsError> {
        let mut tree = TaxonomyTree {
            son_father: HashMap::new(),
            father_son: HashMap::new(),
            rank_of: HashMap::new(),
            valid_ranks: HashSet::new(),
            merged: HashMap::new(),
            name_to_ids: BTreeMap::new(),
            id_to_names: HashMap::new(),
            valid_name_classes: HashSet::new(),
            ancestors_cache: OnceLock::new(),
            descendants_cache: OnceLock::new(),
        };
        tree.load_nodes(nodes_path.as_ref())?;
        tree.load_merged(merged_path.as_ref())?;
        tree.load_names(names_path.as_ref())?;

        debug!(
            nodes = tree.son_father.len(),
            merged = tree.merged.len(),
            names = tree.name_to_ids.len(),
            "taxonomy tree built"
        );
        Ok(tree)
    }

    fn load_nodes(&mut self, path: &Path) -> Result<(), StatsError> {
        let reader = open_text(path)?;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StatsError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<&str> = line.split('|').collect();
            if values.len() < 3 {
                return Err(StatsError::malformed(
                    "nodes dump",
                    path,
                    line_no + 1,
                    format!("expected `child | parent | rank | …`, got {line:?}"),
                ));
            }
            let son = values[0].trim().to_string();
            let father = values[1].trim().to_string();
            let rank = values[2].trim().to_string();

            self.son_father.entry(son.clone()).or_insert(father.clone());
            self.father_son.entry(father).or_default().push(son.clone());
            // "no rank", the species group and every sub-rank are too
            // unspecific to anchor rank-aware ancestor lookups.
            if rank != "no rank" && !rank.contains("species") && !rank.contains("sub") {
                self.valid_ranks.insert(rank.clone());
            }
            self.rank_of.insert(son, rank);
        }
        self.valid_ranks.insert("species".to_string());
        Ok(())
    }

    fn load_merged(&mut self, path: &Path) -> Result<(), StatsError> {
        let reader = open_text(path)?;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StatsError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<&str> = line.split('|').collect();
            if values.len() < 2 {
                return Err(StatsError::malformed(
                    "merged dump",
                    path,
                    line_no + 1,
                    format!("expected `old_id | new_id`, got {line:?}"),
                ));
            }
            self.merged
                .insert(values[0].trim().to_string(), values[1].trim().to_string());
        }
        Ok(())
    }

    fn load_names(&mut self, path: &Path) -> Result<(), StatsError> {
        let reader = open_text(path)?;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StatsError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<&str> = line.trim_end().split('\t').collect();
            if values.len() < 7 {
                return Err(StatsError::malformed(
                    "names dump",
                    path,
                    line_no + 1,
                    format!("expected seven tab-separated fields, got {line:?}"),
                ));
            }
            let taxon_id = values[0].to_string();
            let name = values[2].to_string();
            let name_class = values[6].to_string();
            self.name_to_ids
                .entry(name.clone())
                .or_default()
                .insert(taxon_id.clone());
            self.id_to_names
                .entry(taxon_id)
                .or_default()
                .insert((name, name_class.clone()));
            self.valid_name_classes.insert(name_class);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    //  Structure queries
    // ------------------------------------------------------------------

    /// Parent of a node; `None` for unknown ids.
    pub fn get_father(&self, node: &str) -> Option<&str> {
        self.son_father.get(node).map(String::as_str)
    }

    /// Direct children; the root's self-entry from the dump is excluded.
    pub fn get_children(&self, node: &str) -> Vec<String> {
        let Some(children) = self.father_son.get(node) else {
            return Vec::new();
        };
        children
            .iter()
            .filter(|child| !(node == ROOT_TAXON && child.as_str() == ROOT_TAXON))
            .cloned()
            .collect()
    }

    /// Every ancestor up to and including the root, by iterative parent
    /// following. Empty for unknown ids.
    pub fn get_all_ancestors(&self, node: &str) -> HashSet<String> {
        let mut ancestors = HashSet::new();
        if !self.son_father.contains_key(node) {
            return ancestors;
        }
        let mut current = node;
        loop {
            let Some(father) = self.son_father.get(current) else {
                debug!(node = current, "dangling parent pointer; stopping ancestor walk");
                break;
            };
            if !ancestors.insert(father.clone()) {
                break;
            }
            if father == ROOT_TAXON {
                break;
            }
            current = father;
        }
        ancestors
    }

    /// Every node below `start`, excluding `start` itself. Each call runs
    /// on a fresh accumulator; nothing is shared between calls.
    pub fn get_all_descendants(&self, start: &str) -> HashSet<String> {
        let mut descendants = HashSet::new();
        self.collect_descendants(start, &mut descendants);
        descendants.remove(start);
        descendants
    }

    fn collect_descendants(&self, node: &str, accumulator: &mut HashSet<String>) {
        if !accumulator.insert(node.to_string()) {
            return;
        }
        if let Some(children) = self.father_son.get(node) {
            for child in children {
                if child != node {
                    self.collect_descendants(child, accumulator);
                }
            }
        }
    }

    /// Ancestor sets for every known node, built once and cached. Lets the
    /// constraint-merging consumers test membership in O(1).
    pub fn ancestors_full_list(&self) -> &HashMap<String, HashSet<String>> {
        self.ancestors_cache.get_or_init(|| {
            self.son_father
                .keys()
                .map(|son| (son.clone(), self.get_all_ancestors(son)))
                .collect()
        })
    }

    /// Descendant sets for every node that has children, built once and
    /// cached.
    pub fn descendants_full_list(&self) -> &HashMap<String, HashSet<String>> {
        self.descendants_cache.get_or_init(|| {
            self.father_son
                .keys()
                .map(|father| (father.clone(), self.get_all_descendants(father)))
                .collect()
        })
    }

    /// Nearest node (the node itself included) whose rank equals the
    /// requested rank, walking up the parent chain. `None` when the rank is
    /// not a recognized anchor rank, the node is unknown, or the walk
    /// reaches the root first.
    pub fn get_ancestor_at_rank(&self, node: &str, rank: &str) -> Option<String> {
        if !self.valid_ranks.contains(rank) {
            return None;
        }
        let node_rank = self.rank_of.get(node)?;
        if !self.son_father.contains_key(node) {
            return None;
        }
        if node_rank == rank {
            return Some(node.to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = node;
        loop {
            let father = self.son_father.get(current)?;
            if father == ROOT_TAXON || !seen.insert(father) {
                return None;
            }
            if self.rank_of.get(father.as_str()).is_some_and(|r| r == rank) {
                return Some(father.clone());
            }
            current = father;
        }
    }

    /// Hop count following parent pointers from `node` up to `target`;
    /// `None` when `target` is not an ancestor of `node`.
    pub fn get_distance_from(&self, node: &str, target: &str) -> Option<u32> {
        if node == target {
            return Some(0);
        }
        if node == ROOT_TAXON {
            return None;
        }
        let mut current = node;
        let mut distance = 0u32;
        loop {
            let father = self.son_father.get(current)?;
            distance += 1;
            if father == target {
                return Some(distance);
            }
            if father == ROOT_TAXON {
                return None;
            }
            current = father;
        }
    }

    // ------------------------------------------------------------------
    //  Names, ranks, merges
    // ------------------------------------------------------------------

    /// Retired id -> replacement id map, consulted by callers before
    /// treating an externally supplied taxon id as unknown.
    pub fn merging(&self) -> &HashMap<String, String> {
        &self.merged
    }

    pub fn names_to_ids(&self) -> &BTreeMap<String, HashSet<String>> {
        &self.name_to_ids
    }

    /// Ids carrying the given name; falls back to the first name (in
    /// lexicographic order) containing it as a substring.
    pub fn ids_for_name(&self, name: &str) -> Option<&HashSet<String>> {
        if let Some(ids) = self.name_to_ids.get(name) {
            return Some(ids);
        }
        self.name_to_ids
            .iter()
            .find(|(taxon_name, _)| taxon_name.contains(name))
            .map(|(_, ids)| ids)
    }

    pub fn id_names_map(&self) -> &HashMap<String, BTreeSet<(String, String)>> {
        &self.id_to_names
    }

    /// Display name of a node under the given name class.
    pub fn get_name(&self, node: &str, name_class: &str) -> Option<String> {
        if !self.valid_name_classes.contains(name_class) {
            return None;
        }
        self.id_to_names.get(node)?.iter().find_map(|(name, class)| {
            if class == name_class {
                Some(name.clone())
            } else {
                None
            }
        })
    }

    pub fn get_scientific_name(&self, node: &str) -> Option<String> {
        self.get_name(node, "scientific name")
    }

    pub fn get_node_rank(&self, node: &str) -> Option<&str> {
        self.rank_of.get(node).map(String::as_str)
    }

    pub fn valid_ranks(&self) -> &HashSet<String> {
        &self.valid_ranks
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // 1 <- 131567 <- 2759 <- 9604(family) <- 9605(genus) <- 9606(species) <- 63221
    const NODES: &str = "\
1\t|\t1\t|\tno rank\t|
131567\t|\t1\t|\tno rank\t|
2759\t|\t131567\t|\tsuperkingdom\t|
9604\t|\t2759\t|\tfamily\t|
9605\t|\t9604\t|\tgenus\t|
9606\t|\t9605\t|\tspecies\t|
63221\t|\t9606\t|\tsubspecies\t|
";

    const MERGED: &str = "\
6\t|\t9605\t|
12\t|\t9606\t|
";

    const NAMES: &str = "\
1\t|\troot\t|\t\t|\tscientific name\t|
9605\t|\tHomo\t|\t\t|\tscientific name\t|
9606\t|\tHomo sapiens\t|\t\t|\tscientific name\t|
9606\t|\thuman\t|\t\t|\tgenbank common name\t|
";

    fn write_dump(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn toy_tree() -> (
        tempfile::NamedTempFile,
        tempfile::NamedTempFile,
        tempfile::NamedTempFile,
        TaxonomyTree,
    ) {
        let nodes = write_dump(NODES);
        let merged = write_dump(MERGED);
        let names = write_dump(NAMES);
        let tree = TaxonomyTree::from_dumps(nodes.path(), merged.path(), names.path()).unwrap();
        (nodes, merged, names, tree)
    }

    #[test]
    fn fathers_and_children_round_trip() {
        let (_n, _m, _na, tree) = toy_tree();
        assert_eq!(tree.get_father("9606"), Some("9605"));
        assert_eq!(tree.get_father("424242"), None);
        assert_eq!(tree.get_children("9605"), vec!["9606".to_string()]);
        // Root's self-entry from the dump is filtered out.
        assert_eq!(tree.get_children("1"), vec!["131567".to_string()]);
    }

    #[test]
    fn ancestors_reach_the_root() {
        let (_n, _m, _na, tree) = toy_tree();
        let ancestors = tree.get_all_ancestors("9606");
        assert!(ancestors.contains("1"));
        assert!(ancestors.contains("9604"));
        assert!(!ancestors.contains("9606"));
        assert_eq!(ancestors.len(), 5);
    }

    #[test]
    fn descendants_exclude_the_start_and_reset_between_calls() {
        let (_n, _m, _na, tree) = toy_tree();
        let first = tree.get_all_descendants("9604");
        assert_eq!(
            first,
            ["9605", "9606", "63221"]
                .into_iter()
                .map(String::from)
                .collect()
        );
        // A second, unrelated call must not see state from the first.
        let second = tree.get_all_descendants("9606");
        assert_eq!(second, HashSet::from(["63221".to_string()]));
    }

    #[test]
    fn rank_aware_ancestor_lookup() {
        let (_n, _m, _na, tree) = toy_tree();
        assert_eq!(
            tree.get_ancestor_at_rank("9606", "genus"),
            Some("9605".to_string())
        );
        assert_eq!(
            tree.get_ancestor_at_rank("9606", "species"),
            Some("9606".to_string())
        );
        assert_eq!(tree.get_ancestor_at_rank("2759", "genus"), None);
        assert_eq!(tree.get_ancestor_at_rank("9606", "subspecies"), None);
        assert_eq!(tree.get_ancestor_at_rank("424242", "genus"), None);
    }

    #[test]
    fn distances_follow_parent_pointers() {
        let (_n, _m, _na, tree) = toy_tree();
        assert_eq!(tree.get_distance_from("9606", "9604"), Some(2));
        assert_eq!(tree.get_distance_from("9606", "1"), Some(5));
        assert_eq!(tree.get_distance_from("9606", "9606"), Some(0));
        assert_eq!(tree.get_distance_from("9604", "9606"), None);
    }

    #[test]
    fn names_and_merges_resolve() {
        let (_n, _m, _na, tree) = toy_tree();
        assert_eq!(
            tree.get_scientific_name("9606"),
            Some("Homo sapiens".to_string())
        );
        assert_eq!(
            tree.get_name("9606", "genbank common name"),
            Some("human".to_string())
        );
        assert_eq!(tree.get_name("9606", "bogus class"), None);
        assert_eq!(tree.merging().get("12"), Some(&"9606".to_string()));
        assert!(tree
            .ids_for_name("Homo sapiens")
            .is_some_and(|ids| ids.contains("9606")));
        // Substring fallback.
        assert!(tree
            .ids_for_name("sapiens")
            .is_some_and(|ids| ids.contains("9606")));
    }

    #[test]
    fn bulk_lists_agree_with_single_queries() {
        let (_n, _m, _na, tree) = toy_tree();
        let ancestors = tree.ancestors_full_list();
        assert_eq!(ancestors["9606"], tree.get_all_ancestors("9606"));
        let descendants = tree.descendants_full_list();
        assert_eq!(descendants["9604"], tree.get_all_descendants("9604"));
    }
}
