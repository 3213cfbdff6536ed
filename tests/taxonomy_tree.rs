use rstest::rstest;

use go_annotation_stats::error::StatsError;
use go_annotation_stats::TaxonomyTree;

const NODES: &str = "tests/data/nodes_toy.dmp";
const MERGED: &str = "tests/data/merged_toy.dmp";
const NAMES: &str = "tests/data/names_toy.dmp";

fn toy_tree() -> TaxonomyTree {
    TaxonomyTree::from_dumps(NODES, MERGED, NAMES).expect("toy dumps should load")
}

// Every parent walk terminates at the root, and the root is an
// ancestor of everything.
#[test]
fn every_node_reaches_the_root() {
    let tree = toy_tree();
    let max_depth = 20;
    for node in ["63221", "9606", "9598", "562", "2759", "131567"] {
        let ancestors = tree.get_all_ancestors(node);
        assert!(ancestors.contains("1"), "{node} should descend from the root");

        let mut current = node.to_string();
        let mut steps = 0;
        while current != "1" {
            current = tree
                .get_father(&current)
                .unwrap_or_else(|| panic!("{current} should have a father"))
                .to_string();
            steps += 1;
            assert!(steps <= max_depth, "father chain from {node} did not terminate");
        }
    }
}

// Ancestor/descendant duality over every known pair.
#[test]
fn ancestors_and_descendants_are_dual() {
    let tree = toy_tree();
    let ancestors = tree.ancestors_full_list();
    let descendants = tree.descendants_full_list();

    for (node, node_ancestors) in ancestors {
        for ancestor in node_ancestors {
            let below = descendants
                .get(ancestor)
                .unwrap_or_else(|| panic!("{ancestor} should have a descendant set"));
            assert!(
                below.contains(node),
                "{node} lists {ancestor} as ancestor, so the reverse must hold"
            );
        }
    }
    // And the other direction.
    for (node, node_descendants) in descendants {
        for descendant in node_descendants {
            assert!(
                ancestors[descendant].contains(node),
                "{descendant} sits below {node}, so {node} must be its ancestor"
            );
        }
    }
}

// Nearest ancestor at a requested rank.
#[rstest]
#[case("9606", "genus", Some("9605"))]
#[case("9606", "family", Some("9604"))]
#[case("63221", "species", Some("9606"))]
#[case("9606", "species", Some("9606"))]
#[case("2759", "genus", None)]
#[case("9606", "subspecies", None)]
#[case("424242", "genus", None)]
fn ancestor_at_rank(#[case] node: &str, #[case] rank: &str, #[case] expected: Option<&str>) {
    let tree = toy_tree();
    assert_eq!(
        tree.get_ancestor_at_rank(node, rank),
        expected.map(String::from)
    );
}

#[test]
fn children_exclude_the_root_self_loop() {
    let tree = toy_tree();
    assert_eq!(tree.get_children("1"), vec!["131567".to_string()]);
    let homo_children = tree.get_children("9605");
    assert_eq!(homo_children.len(), 2);
    assert!(homo_children.contains(&"9606".to_string()));
    assert!(tree.get_children("63221").is_empty());
}

#[test]
fn descendants_run_on_a_fresh_accumulator_each_call() {
    let tree = toy_tree();
    let primates = tree.get_all_descendants("9443");
    assert_eq!(primates.len(), 5);
    assert!(primates.contains("9598"));
    assert!(!primates.contains("9443"));

    // Independent second call: nothing may leak from the first.
    let bacteria = tree.get_all_descendants("2");
    assert_eq!(bacteria.len(), 1);
    assert!(bacteria.contains("562"));
}

#[test]
fn distance_counts_parent_hops() {
    let tree = toy_tree();
    assert_eq!(tree.get_distance_from("9606", "9443"), Some(3));
    assert_eq!(tree.get_distance_from("9606", "1"), Some(9));
    assert_eq!(tree.get_distance_from("9606", "9606"), Some(0));
    // Target below the node is unreachable by parent pointers.
    assert_eq!(tree.get_distance_from("9443", "9606"), None);
    // Different subtree entirely.
    assert_eq!(tree.get_distance_from("562", "9606"), None);
}

#[test]
fn merged_ids_redirect_to_replacements() {
    let tree = toy_tree();
    assert_eq!(tree.merging().get("30"), Some(&"9605".to_string()));
    assert_eq!(tree.merging().get("666"), Some(&"562".to_string()));
    // A merged id is not itself a node.
    assert_eq!(tree.get_father("30"), None);
}

#[test]
fn names_are_keyed_by_name_class() {
    let tree = toy_tree();
    assert_eq!(
        tree.get_scientific_name("9606"),
        Some("Homo sapiens".to_string())
    );
    assert_eq!(
        tree.get_name("9606", "genbank common name"),
        Some("human".to_string())
    );
    assert_eq!(tree.get_name("9606", "not a class"), None);
    assert_eq!(tree.get_scientific_name("424242"), None);

    assert!(tree
        .ids_for_name("Escherichia coli")
        .is_some_and(|ids| ids.contains("562")));
    assert!(tree
        .ids_for_name("troglodytes")
        .is_some_and(|ids| ids.contains("9598")));
    assert!(tree.ids_for_name("Vulcan").is_none());
}

#[test]
fn ranks_are_reported_and_validated() {
    let tree = toy_tree();
    assert_eq!(tree.get_node_rank("9606"), Some("species"));
    assert_eq!(tree.get_node_rank("131567"), Some("no rank"));
    assert_eq!(tree.get_node_rank("424242"), None);

    let ranks = tree.valid_ranks();
    assert!(ranks.contains("species"));
    assert!(ranks.contains("genus"));
    // Sub-ranks and "no rank" never anchor rank lookups.
    assert!(!ranks.contains("subspecies"));
    assert!(!ranks.contains("no rank"));
}

#[test]
fn malformed_nodes_dump_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad_nodes = dir.path().join("nodes.dmp");
    std::fs::write(&bad_nodes, "just one field\n").unwrap();
    let err = TaxonomyTree::from_dumps(&bad_nodes, MERGED, NAMES).unwrap_err();
    assert!(matches!(err, StatsError::MalformedInput { .. }));
}
