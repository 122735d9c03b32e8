use quote::ToTokens;
use syn::Item;
use timber::weave::{AllowedParentIndex, FieldKind, TrackedTypes, WeaveOptions, WeaveOutcome, Weaver};
use timber::Error;

fn options() -> WeaveOptions {
    WeaveOptions::new("crate::shapes")
        .with_tracked(TrackedTypes::parse("crate::shapes::Canvas\ncrate.shapes.Circle\n"))
        .with_allowed_parents(AllowedParentIndex::parse("crate::shapes::Circle:crate::shapes::Canvas\n"))
}

fn weave(source: &str) -> WeaveOutcome {
    let file = syn::parse_file(source).unwrap();
    Weaver::new(&options()).weave_items(file.items)
}

fn render(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| item.to_token_stream().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

const SHAPES: &str = r#"
    use std::rc::Rc;

    pub struct Canvas {
        pub name: String,
        pub focus: Option<Rc<Circle>>,
        #[timber(wrap(ListWrapper<Rc<Circle>>))]
        pub circles: Vec<Rc<Circle>>,
    }

    impl Canvas {
        pub fn focus_on(&self, circle: Rc<Circle>) {
            self.focus = Some(circle);
        }
    }

    pub struct Circle {
        pub radius: f64,
        #[timber(weak)]
        pub canvas: Option<Rc<Canvas>>,
    }

    pub fn blank() -> Canvas {
        Canvas { name: String::new(), focus: None, circles: Vec::new() }
    }
"#;

#[test]
fn test_indexed_types_are_woven() {
    let outcome = weave(SHAPES);
    assert!(outcome.failures.is_empty());
    let woven: Vec<_> = outcome.woven.iter().map(|m| m.identity.as_str()).collect();
    assert_eq!(woven, ["crate::shapes::Canvas", "crate::shapes::Circle"]);

    let out = render(&outcome.items);
    assert!(out.contains("impl :: timber :: Node for Canvas"));
    assert!(out.contains("impl :: timber :: ParentAware for Circle"));
    assert!(out.contains("impl :: core :: ops :: Drop for Canvas"));
    assert!(!out.contains("Drop for Circle"));
    assert!(out.contains(":: timber :: hooks :: store_or_panic (& self . focus , Some (circle)"));
}

#[test]
fn test_allowed_parents_come_from_the_index() {
    let outcome = weave(SHAPES);
    let out = render(&outcome.items);
    assert!(out.contains("fn accepts_parent"));
    assert!(out.contains("is_node_of :: < crate :: shapes :: Canvas > (parent)"));

    let circle = &outcome.woven[1];
    assert_eq!(circle.allowed_parents.len(), 1);
    assert_eq!(circle.kind(circle.field("canvas").unwrap()), FieldKind::Weak);
}

#[test]
fn test_struct_literals_are_adapted() {
    let out = render(&weave(SHAPES).items);
    assert!(out.contains("focus : :: timber :: Field :: new (None)"));
    assert!(out.contains("circles : :: timber :: Field :: new (:: timber :: Substitute :: Bare (Vec :: new ()))"));
    assert!(out.contains("__timber_state : :: timber :: NodeState :: new ()"));
}

#[test]
fn test_markers_are_stripped_everywhere() {
    let source = r#"
        pub struct Loose {
            #[timber(weak)]
            pub other: Option<Rc<Loose>>,
        }
    "#;
    let out = render(&weave(&format!("{SHAPES}{source}")).items);
    assert!(!out.contains("# [timber"));
    assert!(out.contains("pub struct Loose { pub other : Option < Rc < Loose > > , }"));
}

#[test]
fn test_failed_type_is_left_unchanged() {
    let source = r#"
        #[timber(node)]
        pub struct Pair<T> {
            pub left: Rc<T>,
        }

        impl<T> Pair<T> {
            pub fn swap(&self, left: Rc<T>) {
                self.left = left;
            }
        }
    "#;
    let outcome = weave(&format!("{SHAPES}{source}"));
    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.type_name, "Pair");
    assert!(matches!(failure.to_error(), Error::Weave { .. }));
    assert!(!outcome.compile_errors().is_empty());

    let out = render(&outcome.items);
    assert!(out.contains("pub struct Pair < T > { pub left : Rc < T > , }"));
    assert!(out.contains("self . left = left ;"));
    assert_eq!(outcome.woven.len(), 2);
}

#[test]
fn test_mutable_borrow_of_tracked_field_fails() {
    let source = r#"
        #[timber(node)]
        pub struct Frame {
            pub inner: Option<Rc<Circle>>,
        }

        impl Frame {
            pub fn clear(&self) {
                self.inner.take();
            }
        }
    "#;
    let outcome = weave(&format!("{SHAPES}{source}"));
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].error.to_string().contains("`take`"));
}

#[test]
fn test_inspect_reports_field_kinds() {
    let file = syn::parse_file(SHAPES).unwrap();
    let reports: Vec<_> = Weaver::new(&options())
        .inspect(&file.items)
        .into_iter()
        .map(|result| result.unwrap().report())
        .collect();
    let json = serde_json::to_value(&reports).unwrap();

    assert_eq!(json[0]["identity"], "crate::shapes::Canvas");
    let kinds: Vec<_> = json[0]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|field| field["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, ["value", "reference", "wrapped"]);
    assert_eq!(json[0]["wrapped_fields"]["circles"]["arg"], "Vec<Rc<Circle>>");
    assert_eq!(json[1]["weak_fields"][0], "canvas");
}
