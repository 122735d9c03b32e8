use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use timber::node::util::{is_node_of, parent_occurrences};
use timber::{adopt, first_parent_of_type, Error, Node, NodeRef, ParentAware, ParentList, ParentRef, Unmarshaller};

use model::{Chapter, Document, Folder, Section, Shelf, Tag};

/// A hand-written parent-aware leaf that only sections may reference.
/// Sealed notes accept no parent at all.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    #[serde(default)]
    sealed: bool,
    #[serde(skip)]
    parents: ParentList,
}

impl Note {
    fn new(text: &str) -> Self {
        Note {
            text: text.to_string(),
            sealed: false,
            parents: ParentList::new(),
        }
    }

    fn sealed(text: &str) -> Self {
        Note {
            sealed: true,
            ..Note::new(text)
        }
    }
}

impl ParentAware for Note {
    fn parent_list(&self) -> &ParentList {
        &self.parents
    }

    fn accepts_parent(&self, parent: &dyn Node) -> bool {
        !self.sealed && is_node_of::<Section>(parent)
    }
}

#[timber_macros::weave]
mod model {
    use std::rc::Rc;

    use serde::{Deserialize, Serialize};
    use timber::ListWrapper;

    use super::Note;

    #[timber(node)]
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Document {
        pub title: String,
        pub body: Option<Rc<Section>>,
        #[timber(wrap(ListWrapper<Rc<Section>>))]
        pub appendix: Vec<Rc<Section>>,
    }

    impl Document {
        pub fn new(title: &str) -> Self {
            Document {
                title: title.to_string(),
                body: None,
                appendix: Vec::new(),
            }
        }

        pub fn replace_body(&self, body: Option<Rc<Section>>) {
            self.body = body;
        }

        pub fn has_body(&self) -> bool {
            self.body.is_some()
        }

        pub fn appendix_len(&self) -> usize {
            self.appendix.len()
        }
    }

    #[timber(node, parent = Document, parent = Section)]
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Section {
        pub heading: String,
        pub nested: Option<Rc<Section>>,
        pub note: Option<Rc<Note>>,
        #[timber(weak)]
        pub see_also: Option<Rc<Section>>,
    }

    impl Section {
        pub fn new(heading: &str) -> Self {
            Section {
                heading: heading.to_string(),
                nested: None,
                note: None,
                see_also: None,
            }
        }

        pub fn link(&self, other: &Rc<Section>) {
            self.see_also = Some(other.clone());
        }

        pub fn linked(&self) -> Option<Rc<Section>> {
            self.see_also.clone()
        }
    }

    #[timber(node, parent = Document)]
    #[derive(Debug)]
    pub struct Chapter {
        #[timber(base)]
        pub section: Section,
        pub number: u32,
        pub epilogue: Option<Rc<Section>>,
    }

    impl Chapter {
        pub fn new(heading: &str, number: u32) -> Self {
            Chapter {
                section: Section::new(heading),
                number,
                epilogue: None,
            }
        }
    }

    #[timber(node)]
    pub struct Shelf {
        pub section: Option<Rc<Section>>,
        #[timber(wrap(ListWrapper<Rc<Section>>))]
        pub stack: Vec<Rc<Section>>,
    }

    impl Shelf {
        pub fn new() -> Self {
            Shelf {
                section: None,
                stack: Vec::new(),
            }
        }

        pub fn put(&self, section: Rc<Section>) {
            self.section = Some(section);
        }

        pub fn try_put(&self, section: Rc<Section>) -> timber::Result<()> {
            self.section = Some(section);
            Ok(())
        }
    }

    #[timber(node)]
    pub struct Tag {
        pub label: String,
    }

    impl Tag {
        pub fn new(label: &str) -> Self {
            Tag {
                label: label.to_string(),
            }
        }
    }

    /// Has its own `Drop`, so nothing detaches it from its values.
    #[timber(node)]
    pub struct Folder {
        pub tag: Option<Rc<Tag>>,
    }

    impl Folder {
        pub fn new() -> Self {
            Folder { tag: None }
        }
    }

    impl Drop for Folder {
        fn drop(&mut self) {
            log::trace!("dropping folder");
        }
    }
}

fn is<T: ?Sized>(node: &NodeRef, expected: &Rc<T>) -> bool {
    Rc::as_ptr(node) as *const () == Rc::as_ptr(expected) as *const ()
}

fn section(heading: &str) -> Rc<Section> {
    adopt(Section::new(heading)).unwrap()
}

#[test]
fn test_store_adds_parent() {
    let doc = adopt(Document::new("d")).unwrap();
    let body = section("body");

    let old = doc.set_body(Some(body.clone())).unwrap();
    assert!(old.is_none());
    assert_eq!(body.parent_count(), 1);
    assert!(is(&body.parents()[0], &doc));
    assert!(doc.has_body());
}

#[test]
fn test_replacing_a_value_moves_the_parent() {
    let doc = adopt(Document::new("d")).unwrap();
    let first = section("first");
    let second = section("second");

    doc.set_body(Some(first.clone())).unwrap();
    let old = doc.set_body(Some(second.clone())).unwrap();

    assert!(Rc::ptr_eq(&old.unwrap(), &first));
    assert_eq!(first.parent_count(), 0);
    assert_eq!(second.parent_count(), 1);
}

#[test]
fn test_in_method_store_of_none_detaches() {
    let doc = adopt(Document::new("d")).unwrap();
    let body = section("body");

    doc.replace_body(Some(body.clone()));
    assert_eq!(body.parent_count(), 1);

    doc.replace_body(None);
    assert_eq!(body.parent_count(), 0);
    assert!(doc.body().is_none());
    assert!(!doc.has_body());
}

#[test]
fn test_disallowed_parent_is_rejected_by_setter() {
    let shelf = adopt(Shelf::new()).unwrap();
    let loose = section("loose");

    let err = shelf.set_section(Some(loose.clone())).unwrap_err();
    assert!(matches!(err, Error::IllegalParentType { .. }));
    assert!(shelf.section().is_none());
    assert_eq!(loose.parent_count(), 0);
}

#[test]
fn test_disallowed_parent_in_fallible_method() {
    let shelf = adopt(Shelf::new()).unwrap();
    let loose = section("loose");

    assert!(shelf.try_put(loose.clone()).is_err());
    assert!(shelf.section().is_none());
}

#[test]
#[should_panic(expected = "not allowed")]
fn test_disallowed_parent_in_infallible_method_panics() {
    let shelf = adopt(Shelf::new()).unwrap();
    shelf.put(section("loose"));
}

#[test]
fn test_wrapper_rejection_leaves_container_unchanged() {
    let shelf = adopt(Shelf::new()).unwrap();
    let loose = section("loose");

    assert!(shelf.stack().push(loose.clone()).is_err());
    assert!(shelf.stack().is_empty());
    assert_eq!(loose.parent_count(), 0);
}

#[test]
fn test_multiplicity_and_single_parent() {
    let doc = adopt(Document::new("d")).unwrap();
    let shared = section("shared");

    doc.set_body(Some(shared.clone())).unwrap();
    doc.appendix().push(shared.clone()).unwrap();

    assert_eq!(shared.parent_count(), 2);
    assert_eq!(parent_occurrences(&*shared, &ParentRef::of(&doc)), 2);
    let single = shared.single_parent().unwrap().unwrap();
    assert!(is(&single, &doc));

    let other = adopt(Document::new("other")).unwrap();
    other.set_body(Some(shared.clone())).unwrap();
    assert!(matches!(
        shared.single_parent(),
        Err(Error::MultipleParents { count: 2, .. })
    ));

    doc.set_body(None).unwrap();
    assert_eq!(shared.parent_count(), 2);
    assert_eq!(parent_occurrences(&*shared, &ParentRef::of(&doc)), 1);
}

#[test]
fn test_children_follow_declaration_order() {
    let doc = adopt(Document::new("d")).unwrap();
    let body = section("body");
    let a = section("a");
    let b = section("b");

    doc.set_body(Some(body.clone())).unwrap();
    doc.appendix().push(a.clone()).unwrap();
    doc.appendix().push(b.clone()).unwrap();

    let children = doc.children();
    assert_eq!(children.len(), 3);
    assert_eq!(doc.child_count(), children.len());
    let order: Vec<_> = children
        .iter()
        .map(|child| Rc::as_ptr(child) as *const ())
        .collect();
    let expected: Vec<_> = [&body, &a, &b]
        .iter()
        .map(|child| Rc::as_ptr(child) as *const ())
        .collect();
    assert_eq!(order, expected);
}

#[test]
fn test_replacing_a_wrapped_field_moves_element_parents() {
    let doc = adopt(Document::new("d")).unwrap();
    let old = section("old");
    let new = section("new");

    doc.appendix().push(old.clone()).unwrap();
    assert_eq!(old.parent_count(), 1);

    doc.set_appendix(vec![new.clone()]).unwrap();
    assert_eq!(old.parent_count(), 0);
    assert_eq!(new.parent_count(), 1);
    assert_eq!(doc.appendix_len(), 1);

    doc.appendix().remove(0);
    assert_eq!(new.parent_count(), 0);
}

#[test]
fn test_first_parent_of_type_searches_ancestors() {
    let doc = adopt(Document::new("d")).unwrap();
    let outer = section("outer");
    let inner = section("inner");
    let note = Rc::new(Note::new("n"));

    doc.set_body(Some(outer.clone())).unwrap();
    outer.set_nested(Some(inner.clone())).unwrap();
    inner.set_note(Some(note.clone())).unwrap();

    let found = first_parent_of_type::<Section>(&*note).unwrap();
    assert!(Rc::ptr_eq(&found, &inner));
    let found = first_parent_of_type::<Document>(&*note).unwrap();
    assert!(Rc::ptr_eq(&found, &doc));
    assert!(first_parent_of_type::<Shelf>(&*note).is_none());
}

#[test]
fn test_dropping_a_node_detaches_its_values() {
    let body = section("body");
    {
        let doc = adopt(Document::new("d")).unwrap();
        doc.set_body(Some(body.clone())).unwrap();
        assert_eq!(body.parent_count(), 1);
    }
    assert_eq!(body.parent_count(), 0);
}

#[test]
fn test_weak_field_clears_for_good() {
    let doc = adopt(Document::new("d")).unwrap();
    let target = section("target");
    let source = section("source");

    doc.set_body(Some(target.clone())).unwrap();
    source.link(&target);
    assert_eq!(target.parent_count(), 1);
    assert!(Rc::ptr_eq(&source.linked().unwrap(), &target));

    doc.set_body(None).unwrap();
    assert!(source.linked().is_none());

    doc.set_body(Some(target.clone())).unwrap();
    assert!(source.see_also().is_none());
}

#[test]
fn test_dropped_parent_without_detaching_is_pruned() {
    let tag = adopt(Tag::new("t")).unwrap();
    let kept = adopt(Folder::new()).unwrap();
    kept.set_tag(Some(tag.clone())).unwrap();
    {
        let gone = adopt(Folder::new()).unwrap();
        gone.set_tag(Some(tag.clone())).unwrap();
        assert_eq!(tag.parent_count(), 2);
    }

    assert_eq!(tag.parent_count(), 1);
    assert_eq!(tag.parents().len(), 1);
    let single = tag.single_parent().unwrap().unwrap();
    assert!(is(&single, &kept));

    drop(kept);
    assert_eq!(tag.parent_count(), 0);
    assert!(tag.parents().is_empty());
    assert!(tag.single_parent().unwrap().is_none());
}

#[test]
fn test_rejected_store_keeps_parent_order() {
    let first = section("first");
    let second = section("second");
    let note = Rc::new(Note::new("n"));

    first.set_note(Some(note.clone())).unwrap();
    second.set_note(Some(note.clone())).unwrap();

    let err = first.set_note(Some(Rc::new(Note::sealed("s")))).unwrap_err();
    assert!(matches!(err, Error::IllegalParentType { .. }));
    assert!(Rc::ptr_eq(&first.note().unwrap(), &note));
    let parents = note.parents();
    assert_eq!(parents.len(), 2);
    assert!(is(&parents[0], &first));
    assert!(is(&parents[1], &second));
}

#[test]
fn test_plain_rc_node_is_bound_when_stored() {
    let doc = adopt(Document::new("d")).unwrap();
    let body = Rc::new(Section::new("body"));
    let inner = section("inner");

    doc.set_body(Some(body.clone())).unwrap();
    assert!(is(&body.parents()[0], &doc));

    body.set_nested(Some(inner.clone())).unwrap();
    assert_eq!(inner.parent_count(), 1);
    assert!(is(&inner.parents()[0], &body));
}

#[test]
fn test_plain_rc_node_registers_values_it_already_holds() {
    let doc = adopt(Document::new("d")).unwrap();
    let note = Rc::new(Note::new("n"));
    let body = Section::new("body");
    body.set_note(Some(note.clone())).unwrap();
    assert_eq!(note.parent_count(), 0);

    let body = Rc::new(body);
    doc.replace_body(Some(body.clone()));
    assert!(is(&note.parents()[0], &body));
}

#[test]
fn test_plain_rc_node_is_bound_when_pushed() {
    let doc = adopt(Document::new("d")).unwrap();
    let entry = Rc::new(Section::new("entry"));
    let inner = section("inner");

    doc.appendix().push(entry.clone()).unwrap();
    entry.set_nested(Some(inner.clone())).unwrap();
    assert!(is(&inner.parents()[0], &entry));
}

#[test]
fn test_base_node_children_come_first() {
    let chapter = adopt(Chapter::new("one", 1)).unwrap();
    let nested = section("nested");
    let epilogue = section("epilogue");

    chapter.section.set_nested(Some(nested.clone())).unwrap();
    chapter.set_epilogue(Some(epilogue.clone())).unwrap();

    assert!(is(&nested.parents()[0], &chapter));
    assert!(is(&epilogue.parents()[0], &chapter));
    let children = chapter.children();
    assert_eq!(children.len(), 2);
    assert_eq!(Rc::as_ptr(&children[0]) as *const (), Rc::as_ptr(&nested) as *const ());
    assert_eq!(chapter.child_count(), 2);
}

#[test]
fn test_adopt_registers_existing_values() {
    let body = section("body");
    let doc = Document::new("d");
    doc.set_body(Some(body.clone())).unwrap();
    assert_eq!(body.parent_count(), 0);

    let doc = adopt(doc).unwrap();
    assert_eq!(body.parent_count(), 1);
    assert!(is(&body.parents()[0], &doc));
}

#[test]
fn test_unmarshal_wraps_and_registers_parents() {
    let json = r#"{
        "title": "doc",
        "body": {"heading": "intro", "nested": null, "note": {"text": "remember"}},
        "appendix": [
            {"heading": "a", "nested": null, "note": null},
            {"heading": "b", "nested": null, "note": null}
        ]
    }"#;
    let doc: Rc<Document> = Unmarshaller::new().from_str(json).unwrap();

    let body = doc.body().unwrap();
    assert!(is(&body.parents()[0], &doc));
    let note = body.note().unwrap();
    assert!(is(&note.parents()[0], &body));

    let appendix = doc.appendix();
    assert_eq!(appendix.len(), 2);
    for section in appendix.to_vec() {
        assert_eq!(section.parent_count(), 1);
        assert!(is(&section.parents()[0], &doc));
    }

    let extra = section("extra");
    appendix.push(extra.clone()).unwrap();
    assert!(is(&extra.parents()[0], &doc));
    assert_eq!(doc.child_count(), 4);
}

#[test]
fn test_unmarshal_rejects_illegal_parent() {
    let json = r#"{"section": {"heading": "x", "nested": null, "note": null}, "stack": []}"#;
    let result: timber::Result<Rc<ShelfDto>> = Unmarshaller::new().from_str(json);
    assert!(result.is_err());
}

/// Shelf variant that derives serde, for the deserialization error path.
#[timber_macros::weave]
mod dto {
    use std::rc::Rc;

    use serde::Deserialize;

    use super::model::Section;

    #[timber(node)]
    #[derive(Deserialize)]
    pub struct ShelfDto {
        pub section: Option<Rc<Section>>,
        pub stack: Vec<String>,
    }
}

use dto::ShelfDto;

thread_local! {
    static FINISHED: RefCell<Vec<(String, bool)>> = RefCell::new(Vec::new());
}

#[timber_macros::weave]
mod outline {
    use std::rc::Rc;

    use serde::Deserialize;

    #[timber(node)]
    #[derive(Deserialize)]
    pub struct Outline {
        pub name: String,
        pub child: Option<Rc<Outline>>,
    }

    impl Outline {
        fn after_unmarshal(&self, _unmarshaller: &timber::Unmarshaller, parent: Option<&timber::NodeRef>) {
            let entry = (self.name.clone(), parent.is_some());
            super::FINISHED.with(|finished| finished.borrow_mut().push(entry));
        }
    }
}

use outline::Outline;

#[test]
fn test_unmarshal_finishes_inner_nodes_first() {
    let json = r#"{"name": "outer", "child": {"name": "middle", "child": {"name": "inner", "child": null}}}"#;
    let outer: Rc<Outline> = Unmarshaller::new().from_str(json).unwrap();

    let finished = FINISHED.with(|finished| finished.borrow().clone());
    let names: Vec<_> = finished.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["inner", "middle", "outer"]);
    assert!(finished[0].1 && finished[1].1);
    assert!(!finished[2].1);

    let middle = outer.child().unwrap();
    assert!(is(&middle.parents()[0], &outer));
    assert!(is(&middle.child().unwrap().parents()[0], &middle));
}
