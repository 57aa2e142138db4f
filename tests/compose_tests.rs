//! Integration tests for skeleton composition
//!
//! Renders the built-in module skeleton end to end and checks the
//! properties every rendering must have.

use proptest::prelude::*;
use treeforge::bundle::{TemplateSet, DEFAULT_TEMPLATE_SET};
use treeforge::compose::{render, ComposeError, Composer, Fragments, RenderContext, Skeleton, Slot};

fn module_skeleton() -> Skeleton {
    TemplateSet::builtin(DEFAULT_TEMPLATE_SET)
        .unwrap()
        .skeleton("Analyzer.cc")
        .unwrap()
        .clone()
}

fn muon_fragments() -> Fragments {
    Fragments::new()
        .with(
            Slot::Includes,
            [
                "DataFormats/MuonReco/interface/Muon.h",
                "DataFormats/MuonReco/interface/MuonFwd.h",
            ],
        )
        .with(
            Slot::Declarations,
            ["std::vector<float> muon_pt;", "std::vector<float> muon_eta;"],
        )
        .with(
            Slot::Setup,
            [
                "edm::Service<TFileService> fs;",
                "myTree = fs->make<TTree>(\"muons\", \"muons\");",
                "myTree->Branch(\"muon_pt\", &muon_pt);",
                "myTree->Branch(\"muon_eta\", &muon_eta);",
            ],
        )
        .with(
            Slot::PerItem,
            [
                "muon_pt.clear();",
                "muon_eta.clear();",
                "edm::Handle<reco::MuonCollection> muons;",
                "iEvent.getByLabel(\"muons\", muons);",
                "for (auto it = muons->begin(); it != muons->end(); ++it) {",
                "  muon_pt.push_back(it->pt());",
                "  muon_eta.push_back(it->eta());",
                "}",
                "myTree->Fill();",
            ],
        )
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_muon_module_snapshot() {
    let composer = Composer::new(RenderContext {
        module_name: "Muons".to_string(),
        ..RenderContext::default()
    });
    let module = composer
        .compose(&module_skeleton(), &muon_fragments())
        .unwrap();
    insta::assert_snapshot!("muon_module", module);
}

#[test]
fn test_empty_fragments_render_the_bare_skeleton() {
    let module = render(&module_skeleton(), &[], &[], &[], &[]).unwrap();
    assert!(!module.contains("slot:"));
    assert!(module.contains("   TTree *myTree;\n\n};"));
    assert!(module.contains("DEFINE_FWK_MODULE(Analyzer);"));
}

#[test]
fn test_slot_independence() {
    let skeleton = module_skeleton();
    let base = render(&skeleton, &[], &lines(&["double x;"]), &[], &[]).unwrap();
    let with_include = render(
        &skeleton,
        &lines(&["vector"]),
        &lines(&["double x;"]),
        &[],
        &[],
    )
    .unwrap();

    // Only the include region differs.
    let stripped = with_include.replacen("#include \"vector\"\n", "", 1);
    assert_eq!(stripped, base);
}

#[test]
fn test_undeclared_use_in_setup() {
    let err = render(
        &module_skeleton(),
        &[],
        &[],
        &lines(&["myTree->Branch(\"pt\", &pt_value);"]),
        &[],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UnresolvedReference { ref name, slot: Slot::Setup } if name == "pt_value"
    ));
}

#[test]
fn test_undeclared_factor_in_product() {
    let err = render(
        &module_skeleton(),
        &[],
        &lines(&["double x;", "double scale;"]),
        &[],
        &lines(&["x = scale * undeclared_factor;"]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UnresolvedReference { ref name, slot: Slot::PerItem } if name == "undeclared_factor"
    ));
}

#[test]
fn test_skeleton_member_cannot_be_redeclared() {
    let err = render(&module_skeleton(), &[], &lines(&["TTree *myTree;"]), &[], &[]).unwrap_err();
    assert!(matches!(err, ComposeError::DuplicateDeclaration { ref name } if name == "myTree"));
}

#[test]
fn test_skeleton_headers_are_not_included_twice() {
    let out = render(&module_skeleton(), &lines(&["TTree.h", "vector"]), &[], &[], &[]).unwrap();
    assert_eq!(out.matches("#include \"TTree.h\"").count(), 1);
    assert_eq!(out.matches("#include \"vector\"").count(), 1);
}

#[test]
fn test_skeleton_parameters_are_ambient() {
    // iEvent and iSetup are parameters of the skeleton's analyze method
    let out = render(
        &module_skeleton(),
        &[],
        &lines(&["int run_number;"]),
        &[],
        &lines(&["run_number = iEvent.id().run();"]),
    )
    .unwrap();
    assert!(out.contains("   run_number = iEvent.id().run();"));
}

#[test]
fn test_out_of_order_skeleton_rejected() {
    let err = Skeleton::parse(
        "backwards",
        "{# slot: per_item #}\n{# slot: declarations #}\n",
    )
    .unwrap_err();
    assert!(matches!(err, ComposeError::InvalidSkeleton { .. }));
}

proptest! {
    #[test]
    fn prop_render_is_deterministic(
        names in prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 0..6),
    ) {
        let names: Vec<String> = names.into_iter().map(|n| format!("v_{n}")).collect();
        let declarations: Vec<String> = names.iter().map(|n| format!("double {n};")).collect();
        let per_item: Vec<String> = names.iter().map(|n| format!("{n} = 1.0;")).collect();
        let skeleton = module_skeleton();

        let first = render(&skeleton, &[], &declarations, &[], &per_item).unwrap();
        let second = render(&skeleton, &[], &declarations, &[], &per_item).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_includes_never_duplicated(
        headers in prop::collection::vec("gen/[A-Za-z]{1,6}\\.h", 0..12),
    ) {
        let out = render(&module_skeleton(), &headers, &[], &[], &[]).unwrap();
        let mut seen = Vec::new();
        for header in &headers {
            let directive = format!("#include \"{header}\"");
            prop_assert_eq!(out.matches(&directive).count(), 1);
            if !seen.contains(header) {
                seen.push(header.clone());
            }
        }

        // First occurrences keep their order
        let positions: Vec<usize> = seen
            .iter()
            .map(|h| out.find(&format!("#include \"{h}\"")).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
