use core::cell::RefCell;
use progressive_dom::{
	cancel::CancellationToken,
	descriptor::BackendKind,
	navigation::{
		classify_anchor_click, fragment, has_interactive_router, interactive_router, is_same_page_with_hash, is_within_base_uri_space,
		register_interactive_router, strip_fragment, unregister_interactive_router, Anchor, AnchorClick, Modifiers, NavigationEvent,
		NavigationListeners, PathEntry,
	},
	ContractError,
};
use std::rc::Rc;

#[test]
fn base_uri_space() {
	let base = "https://example.com/app/";
	assert!(is_within_base_uri_space(base, "https://example.com/app"));
	assert!(is_within_base_uri_space(base, "https://example.com/app/"));
	assert!(is_within_base_uri_space(base, "https://example.com/app/deep/page"));
	assert!(is_within_base_uri_space(base, "https://example.com/app?query"));
	assert!(is_within_base_uri_space(base, "https://example.com/app#top"));
	assert!(!is_within_base_uri_space(base, "https://example.com/application"));
	assert!(!is_within_base_uri_space(base, "https://example.com/"));
	assert!(!is_within_base_uri_space(base, "http://example.com/app/"));

	// Everything after the last slash is not part of the base.
	assert!(is_within_base_uri_space("https://example.com/app/index.html", "https://example.com/app/other"));
}

#[test]
fn fragments() {
	assert_eq!(strip_fragment("https://example.com/a?b#c"), "https://example.com/a?b");
	assert_eq!(strip_fragment("https://example.com/a"), "https://example.com/a");
	assert_eq!(fragment("https://example.com/a#c"), Some("c"));
	assert_eq!(fragment("https://example.com/a#"), None);
	assert_eq!(fragment("https://example.com/a"), None);

	assert!(is_same_page_with_hash("https://example.com/a", "https://example.com/a#c"));
	assert!(is_same_page_with_hash("https://example.com/a#b", "https://example.com/a#c"));
	assert!(!is_same_page_with_hash("https://example.com/a#b", "https://example.com/a"));
	assert!(!is_same_page_with_hash("https://example.com/a", "https://example.com/b#c"));
}

fn click_on(anchor: Anchor) -> AnchorClick {
	AnchorClick {
		path: vec![PathEntry::Other, PathEntry::Anchor(anchor), PathEntry::Other],
		..AnchorClick::default()
	}
}

fn link(href: &str) -> Anchor {
	Anchor {
		href: Some(href.to_owned()),
		..Anchor::default()
	}
}

#[test]
fn plain_click_is_intercepted() {
	assert_eq!(classify_anchor_click(&click_on(link("https://example.com/a"))), Some("https://example.com/a"));
	assert_eq!(
		classify_anchor_click(&click_on(Anchor {
			target: Some("_self".to_owned()),
			..link("https://example.com/a")
		})),
		Some("https://example.com/a")
	);
}

#[test]
fn browser_handled_clicks_are_left_alone() {
	let base = click_on(link("https://example.com/a"));

	for modifiers in [
		Modifiers { ctrl: true, ..Modifiers::default() },
		Modifiers { shift: true, ..Modifiers::default() },
		Modifiers { alt: true, ..Modifiers::default() },
		Modifiers { meta: true, ..Modifiers::default() },
	] {
		assert_eq!(classify_anchor_click(&AnchorClick { modifiers, ..base.clone() }), None);
	}
	assert_eq!(classify_anchor_click(&AnchorClick { button: 1, ..base.clone() }), None);
	assert_eq!(
		classify_anchor_click(&AnchorClick {
			default_prevented: true,
			..base.clone()
		}),
		None
	);
	assert_eq!(
		classify_anchor_click(&click_on(Anchor {
			target: Some("_blank".to_owned()),
			..link("https://example.com/a")
		})),
		None
	);
	assert_eq!(
		classify_anchor_click(&click_on(Anchor {
			download: true,
			..link("https://example.com/a")
		})),
		None
	);
	assert_eq!(classify_anchor_click(&click_on(Anchor::default())), None);
	assert_eq!(
		classify_anchor_click(&AnchorClick {
			path: vec![PathEntry::Other],
			..AnchorClick::default()
		}),
		None
	);
}

#[test]
fn innermost_anchor_wins() {
	let click = AnchorClick {
		path: vec![PathEntry::Anchor(link("https://example.com/inner")), PathEntry::Anchor(link("https://example.com/outer"))],
		..AnchorClick::default()
	};
	assert_eq!(classify_anchor_click(&click), Some("https://example.com/inner"));
}

#[test]
fn single_interactive_router() {
	assert!(!has_interactive_router());
	register_interactive_router(BackendKind::Server).unwrap();
	register_interactive_router(BackendKind::Server).unwrap();
	assert_eq!(
		register_interactive_router(BackendKind::WebAssembly),
		Err(ContractError::RouterAlreadyRegistered {
			current: BackendKind::Server,
			attempted: BackendKind::WebAssembly,
		})
	);

	unregister_interactive_router(BackendKind::WebAssembly);
	assert_eq!(interactive_router(), Some(BackendKind::Server));

	unregister_interactive_router(BackendKind::Server);
	assert!(!has_interactive_router());
	register_interactive_router(BackendKind::WebAssembly).unwrap();
	unregister_interactive_router(BackendKind::WebAssembly);
}

#[test]
fn listeners() {
	let listeners = Rc::new(NavigationListeners::new());
	let seen = Rc::new(RefCell::new(Vec::new()));

	let first_seen = Rc::clone(&seen);
	let first = listeners.add(move |event| first_seen.borrow_mut().push(format!("first {:?}", event)));

	let second_seen = Rc::clone(&seen);
	let weak = Rc::downgrade(&listeners);
	listeners.add(move |_| {
		second_seen.borrow_mut().push("second".to_owned());
		// Changes during notification apply from the next event on.
		if let Some(listeners) = weak.upgrade() {
			listeners.remove(first);
		}
	});

	listeners.notify(NavigationEvent::Started { href: "a" });
	listeners.notify(NavigationEvent::Completed { href: "a" });
	assert_eq!(*seen.borrow(), [r#"first Started { href: "a" }"#, "second", "second"]);
	assert!(!listeners.remove(first));
}

#[test]
fn cancellation() {
	let token = CancellationToken::new();
	let clone = token.clone();
	let calls = Rc::new(RefCell::new(0));
	token.on_cancel({
		let calls = Rc::clone(&calls);
		move || *calls.borrow_mut() += 1
	});

	assert!(!clone.is_cancelled());
	clone.cancel();
	clone.cancel();
	assert!(token.is_cancelled());
	assert_eq!(*calls.borrow(), 1);

	token.on_cancel({
		let calls = Rc::clone(&calls);
		move || *calls.borrow_mut() += 10
	});
	assert_eq!(*calls.borrow(), 11);

	assert!(token.same_as(&clone));
	assert!(!token.same_as(&CancellationToken::new()));
}
