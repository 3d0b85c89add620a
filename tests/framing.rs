use progressive_dom::framing::{boundary_marker, FrameSplitter, Utf8Decoder};

#[test]
fn marker_format() {
	assert_eq!(boundary_marker("abc"), "<!--abc-->");
}

#[test]
fn splits_on_markers() {
	let mut splitter = FrameSplitter::new(boundary_marker("x"));
	assert_eq!(splitter.push("first<!--x-->second<!--x-->"), ["first", "second"]);
	assert_eq!(splitter.push("third"), Vec::<String>::new());
	assert_eq!(splitter.finish().as_deref(), Some("third"));
}

#[test]
fn marker_straddling_chunks() {
	let mut splitter = FrameSplitter::new(boundary_marker("token"));
	let mut frames = Vec::new();
	for chunk in ["a<", "!--to", "k", "en-", "->b"] {
		frames.extend(splitter.push(chunk));
	}
	assert_eq!(frames, ["a"]);
	assert_eq!(splitter.finish().as_deref(), Some("b"));
}

#[test]
fn explicit_empty_frames_are_kept() {
	let mut splitter = FrameSplitter::new(boundary_marker("x"));
	assert_eq!(splitter.push("<!--x--><!--x-->"), ["", ""]);
	assert_eq!(splitter.finish(), None);
}

#[test]
fn near_misses_are_content() {
	let mut splitter = FrameSplitter::new(boundary_marker("x"));
	assert!(splitter.push("<!--y--><!--x").is_empty());
	assert!(splitter.push("y-->").is_empty());
	assert_eq!(splitter.finish().as_deref(), Some("<!--y--><!--xy-->"));
}

#[test]
fn rescan_respects_char_boundaries() {
	let mut splitter = FrameSplitter::new(boundary_marker("x"));
	assert!(splitter.push("ééééé").is_empty());
	assert_eq!(splitter.push("<!--x-->"), ["ééééé"]);
}

#[test]
fn decoder_joins_split_sequences() {
	let bytes = "añb€c".as_bytes();
	let mut decoder = Utf8Decoder::new();
	let mut text = String::new();
	for byte in bytes {
		text.push_str(&decoder.decode(&[*byte]));
	}
	text.push_str(&decoder.finish());
	assert_eq!(text, "añb€c");
}

#[test]
fn decoder_replaces_invalid_bytes() {
	let mut decoder = Utf8Decoder::new();
	assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
	assert_eq!(decoder.decode(b"c\xE2\x82"), "c");
	assert_eq!(decoder.finish(), "\u{FFFD}");
}
