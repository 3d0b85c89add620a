use progressive_dom::{
	descriptor::{BackendKind, ComponentKey, ComponentKind, Payload},
	discover::{discover_persisted_state, Discoverer},
	dom::Dom,
	memory::{MemoryDocument, NodeId},
	ProtocolError,
};
use serde_json::json;

fn page() -> (MemoryDocument, NodeId) {
	let mut dom = MemoryDocument::new();
	let root = dom.document();
	let html = dom.create_element("html");
	dom.append_child(root, html);
	let body = dom.create_element("body");
	dom.append_child(html, body);
	(dom, body)
}

fn comment(dom: &mut MemoryDocument, parent: NodeId, data: &str) -> NodeId {
	let comment = dom.create_comment(data);
	dom.append_child(parent, comment);
	comment
}

fn all(dom: &MemoryDocument) -> Result<Vec<progressive_dom::descriptor::ComponentDescriptor<NodeId>>, ProtocolError> {
	Discoverer::new().discover_all(dom, &dom.document_node())
}

#[test]
fn server_markers_sort_by_sequence() {
	let (mut dom, body) = page();
	let second = comment(&mut dom, body, r#"Framework:{"type":"server","sequence":1,"descriptor":"b"}"#);
	let first = comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);

	let found = Discoverer::new().discover(&dom, &dom.document_node(), ComponentKind::Server).unwrap();
	assert_eq!(found.len(), 2);
	assert_eq!(found[0].start(), &first);
	assert_eq!(found[1].start(), &second);
	assert_eq!(found[0].sequence(), Some(0));
}

#[test]
fn webassembly_markers_keep_document_order() {
	let (mut dom, body) = page();
	let outer = dom.create_element("div");
	dom.append_child(body, outer);
	let a = comment(&mut dom, outer, r#"Framework:{"type":"webassembly","assembly":"App","typeName":"App.A"}"#);
	let b = comment(&mut dom, body, r#"Framework:{"type":"webassembly","assembly":"App","typeName":"App.B"}"#);

	let found = Discoverer::new().discover(&dom, &dom.document_node(), ComponentKind::WebAssembly).unwrap();
	let starts: Vec<_> = found.iter().map(|d| *d.start()).collect();
	assert_eq!(starts, [a, b]);
	assert!(found[0].unique_id() < found[1].unique_id());
}

#[test]
fn prerendered_region_is_opaque() {
	let (mut dom, body) = page();
	let start = comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a","prerenderId":"p1"}"#);
	let content = dom.create_element("div");
	dom.append_child(body, content);
	comment(&mut dom, content, r#"Framework:{"type":"server","sequence":1,"descriptor":"nested"}"#);
	let end = comment(&mut dom, body, r#"Framework:{"prerenderId":"p1"}"#);

	let found = all(&dom).unwrap();
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].start(), &start);
	assert_eq!(found[0].end(), Some(&end));
	assert_eq!(found[0].prerender_id(), Some("p1"));
}

#[test]
fn missing_end_marker() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a","prerenderId":"p1"}"#);

	assert!(matches!(all(&dom), Err(ProtocolError::MissingEndMarker { prerender_id }) if prerender_id == "p1"));
}

#[test]
fn mismatched_end_marker() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a","prerenderId":"p1"}"#);
	comment(&mut dom, body, r#"Framework:{"prerenderId":"p2"}"#);

	assert!(matches!(
		all(&dom),
		Err(ProtocolError::EndMarkerMismatch { expected, found }) if expected == "p1" && found == "p2"
	));
}

#[test]
fn end_marker_with_extra_keys() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a","prerenderId":"p1"}"#);
	comment(&mut dom, body, r#"Framework:{"prerenderId":"p1","type":"server"}"#);

	assert!(matches!(all(&dom), Err(ProtocolError::InvalidEndMarker(_))));
}

#[test]
fn marker_directly_under_document() {
	let (mut dom, _) = page();
	let root = dom.document();
	comment(&mut dom, root, r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);

	assert!(matches!(all(&dom), Err(ProtocolError::MarkerOnDocument)));
}

#[test]
fn malformed_markers() {
	let cases: [(&str, fn(&ProtocolError) -> bool); 8] = [
		("Framework:{not json", |e| matches!(e, ProtocolError::InvalidJson { .. })),
		(r#"Framework:{"type":"bogus"}"#, |e| matches!(e, ProtocolError::InvalidType(Some(t)) if t == "bogus")),
		(r#"Framework:{"sequence":0}"#, |e| matches!(e, ProtocolError::InvalidType(None))),
		(r#"Framework:{"type":"server","descriptor":"a"}"#, |e| matches!(e, ProtocolError::InvalidServerMarker(_))),
		(r#"Framework:{"type":"server","sequence":-1,"descriptor":"a"}"#, |e| matches!(e, ProtocolError::InvalidServerMarker(_))),
		(r#"Framework:{"type":"server","sequence":0,"descriptor":""}"#, |e| matches!(e, ProtocolError::InvalidServerMarker(_))),
		(r#"Framework:{"type":"webassembly","typeName":"T"}"#, |e| matches!(e, ProtocolError::InvalidWebAssemblyMarker(_))),
		(r#"Framework:{"type":"webassembly","assembly":"A","typeName":"T","parameterValues":"***"}"#, |e| {
			matches!(e, ProtocolError::InvalidBase64 { field: "parameterValues", .. })
		}),
	];
	for (data, check) in cases {
		let (mut dom, body) = page();
		comment(&mut dom, body, data);
		let error = all(&dom).expect_err(data);
		assert!(check(&error), "{:?} for {:?}", error, data);
	}
}

#[test]
fn unrelated_comments_are_ignored() {
	let (mut dom, body) = page();
	comment(&mut dom, body, "just a comment");
	comment(&mut dom, body, "Framework:");
	let text = dom.create_text(r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);
	dom.append_child(body, text);

	assert!(all(&dom).unwrap().is_empty());
}

#[test]
fn webassembly_parameters_are_decoded() {
	let (mut dom, body) = page();
	comment(
		&mut dom,
		body,
		r#"Framework:{"type":"webassembly","assembly":"App","typeName":"App.Counter","parameterDefinitions":"W10=","parameterValues":"W10="}"#,
	);

	let found = all(&dom).unwrap();
	match found[0].payload() {
		Payload::WebAssembly(webassembly) => {
			assert_eq!(webassembly.parameter_definitions.as_deref(), Some(&b"[]"[..]));
			assert_eq!(webassembly.parameter_values.as_deref(), Some(&b"[]"[..]));
		}
		other => panic!("unexpected payload {:?}", other),
	}
	assert_eq!(
		serde_json::to_value(found[0].to_marker(BackendKind::WebAssembly)).unwrap(),
		json!({
			"type": "webassembly",
			"assembly": "App",
			"typeName": "App.Counter",
			"parameterDefinitions": "W10=",
			"parameterValues": "W10=",
		})
	);
	assert_eq!(found[0].to_marker(BackendKind::Server), None);
}

#[test]
fn auto_markers_carry_both_payloads() {
	let (mut dom, body) = page();
	comment(
		&mut dom,
		body,
		r#"Framework:{"type":"auto","sequence":3,"descriptor":"d","assembly":"App","typeName":"App.X","key":{"locationHash":"h1"}}"#,
	);

	let found = all(&dom).unwrap();
	assert_eq!(found[0].kind(), ComponentKind::Auto);
	assert_eq!(found[0].key(), Some(&ComponentKey { location_hash: "h1".to_owned(), formatted_component_key: None }));
	assert_eq!(
		serde_json::to_value(found[0].to_marker(BackendKind::Server)).unwrap(),
		json!({ "type": "server", "key": { "locationHash": "h1" }, "sequence": 3, "descriptor": "d" })
	);
	assert!(found[0].to_marker(BackendKind::WebAssembly).is_some());
}

#[test]
fn unique_ids_only_count_matching_markers() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"webassembly","assembly":"App","typeName":"App.A"}"#);
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);

	let discoverer = Discoverer::new();
	let server = discoverer.discover(&dom, &dom.document_node(), ComponentKind::Server).unwrap();
	let webassembly = discoverer.discover(&dom, &dom.document_node(), ComponentKind::WebAssembly).unwrap();
	let again = discoverer.discover(&dom, &dom.document_node(), ComponentKind::Server).unwrap();
	assert_eq!(webassembly[0].unique_id(), server[0].unique_id() + 1);
	assert_eq!(again[0].unique_id(), server[0].unique_id() + 2);
}

#[test]
fn unique_ids_are_shared_between_discoverers() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);

	let first = all(&dom).unwrap();
	let second = all(&dom).unwrap();
	assert!(second[0].unique_id() > first[0].unique_id());
}

#[test]
fn discover_all_groups_by_kind() {
	let (mut dom, body) = page();
	comment(&mut dom, body, r#"Framework:{"type":"auto","sequence":0,"descriptor":"x","assembly":"App","typeName":"App.X"}"#);
	comment(&mut dom, body, r#"Framework:{"type":"webassembly","assembly":"App","typeName":"App.A"}"#);
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":1,"descriptor":"b"}"#);
	comment(&mut dom, body, r#"Framework:{"type":"server","sequence":0,"descriptor":"a"}"#);

	let kinds: Vec<_> = all(&dom).unwrap().iter().map(|d| (d.kind(), d.sequence())).collect();
	assert_eq!(
		kinds,
		[
			(ComponentKind::Server, Some(0)),
			(ComponentKind::Server, Some(1)),
			(ComponentKind::WebAssembly, None),
			(ComponentKind::Auto, Some(0)),
		]
	);
}

#[test]
fn persisted_state_is_consumed_once() {
	let (mut dom, body) = page();
	let div = dom.create_element("div");
	dom.append_child(body, div);
	let state = comment(&mut dom, div, "Framework-Component-State:eyJhIjoxfQ==");
	comment(&mut dom, body, "Framework-Component-State:c2Vjb25k");

	let root = dom.document();
	assert_eq!(discover_persisted_state(&mut dom, &root).as_deref(), Some("eyJhIjoxfQ=="));
	assert!(!dom.is_connected(&state));
	assert_eq!(discover_persisted_state(&mut dom, &root).as_deref(), Some("c2Vjb25k"));
	assert_eq!(discover_persisted_state(&mut dom, &root), None);
}

#[test]
fn persisted_state_must_be_base64() {
	let (mut dom, body) = page();
	comment(&mut dom, body, "Framework-Component-State:not base64!");

	let root = dom.document();
	assert_eq!(discover_persisted_state(&mut dom, &root), None);
}

#[test]
fn persisted_state_allows_only_leading_whitespace() {
	let (mut dom, body) = page();
	let trailing = comment(&mut dom, body, "Framework-Component-State:c2Vjb25k ");
	comment(&mut dom, body, "  Framework-Component-State:eyJhIjoxfQ==");

	let root = dom.document();
	assert_eq!(discover_persisted_state(&mut dom, &root).as_deref(), Some("eyJhIjoxfQ=="));
	assert_eq!(discover_persisted_state(&mut dom, &root), None);
	assert!(dom.is_connected(&trailing));
}
