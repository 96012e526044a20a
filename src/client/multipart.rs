//! `multipart/form-data` request bodies.
//!
//! The boundary is derived from a SHA-256 digest of every part, so encoding the same form twice
//! (for instance when a request is retried after a refresh) yields identical bytes.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const BOUNDARY_PREFIX: &str = "cooknet-";

/// File attached to a [`MultipartForm`].
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
	/// File name reported to the server.
	pub filename: String,
	/// MIME type, e.g. `image/jpeg`.
	pub content_type: String,
	/// File contents.
	pub bytes: Vec<u8>,
}
impl FilePart {
	/// Wraps file contents with the metadata the server needs to store them.
	pub fn new(
		filename: impl Into<String>,
		content_type: impl Into<String>,
		bytes: impl Into<Vec<u8>>,
	) -> Self {
		Self { filename: filename.into(), content_type: content_type.into(), bytes: bytes.into() }
	}
}
impl Debug for FilePart {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FilePart")
			.field("filename", &self.filename)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
	Text(String),
	File(FilePart),
}

/// Ordered set of form fields and file parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
	parts: Vec<(String, Part)>,
}
impl MultipartForm {
	/// Empty form.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.parts.push((name.into(), Part::Text(value.into())));

		self
	}

	/// Appends a file part.
	pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
		self.parts.push((name.into(), Part::File(file)));

		self
	}

	/// Text value of the first field named `name`.
	pub fn text_value(&self, name: &str) -> Option<&str> {
		self.parts.iter().find_map(|(field, part)| match part {
			Part::Text(value) if field == name => Some(value.as_str()),
			_ => None,
		})
	}

	/// First file part named `name`.
	pub fn file_part(&self, name: &str) -> Option<&FilePart> {
		self.parts.iter().find_map(|(field, part)| match part {
			Part::File(file) if field == name => Some(file),
			_ => None,
		})
	}

	/// Number of parts.
	pub fn len(&self) -> usize {
		self.parts.len()
	}

	/// Returns `true` when the form has no parts.
	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}

	/// Boundary separating the parts.
	pub fn boundary(&self) -> String {
		let mut hasher = Sha256::new();

		for (name, part) in &self.parts {
			hasher.update(name.as_bytes());
			hasher.update([0_u8]);

			match part {
				Part::Text(value) => hasher.update(value.as_bytes()),
				Part::File(file) => {
					hasher.update(file.filename.as_bytes());
					hasher.update([0_u8]);
					hasher.update(file.content_type.as_bytes());
					hasher.update([0_u8]);
					hasher.update(&file.bytes);
				},
			}

			hasher.update([0xff_u8]);
		}

		format!("{BOUNDARY_PREFIX}{}", URL_SAFE_NO_PAD.encode(hasher.finalize()))
	}

	/// `content-type` header value announcing the boundary.
	pub fn content_type(&self) -> String {
		format!("multipart/form-data; boundary={}", self.boundary())
	}

	/// Encodes the form, returning the `content-type` header value and the body.
	pub fn encode(&self) -> (String, Vec<u8>) {
		let boundary = self.boundary();
		let mut body = Vec::new();

		for (name, part) in &self.parts {
			body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());

			match part {
				Part::Text(value) => {
					body.extend_from_slice(
						format!(
							"Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
							escape(name)
						)
						.as_bytes(),
					);
					body.extend_from_slice(value.as_bytes());
				},
				Part::File(file) => {
					body.extend_from_slice(
						format!(
							"Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
							 Content-Type: {}\r\n\r\n",
							escape(name),
							escape(&file.filename),
							file.content_type.replace(['\r', '\n'], ""),
						)
						.as_bytes(),
					);
					body.extend_from_slice(&file.bytes);
				},
			}

			body.extend_from_slice(b"\r\n");
		}

		body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

		(format!("multipart/form-data; boundary={boundary}"), body)
	}
}

// Quoted header parameters percent-encode the characters that would end them.
fn escape(value: &str) -> String {
	value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn encodes_text_and_file_parts_in_order() {
		let form = MultipartForm::new()
			.text("recipe_title", "Soup")
			.file("image", FilePart::new("soup.jpg", "image/jpeg", b"JPEG".to_vec()));
		let (content_type, body) = form.encode();
		let boundary = form.boundary();

		assert!(boundary.starts_with(BOUNDARY_PREFIX));
		assert_eq!(content_type, format!("multipart/form-data; boundary={boundary}"));
		assert_eq!(content_type, form.content_type());
		assert_eq!(
			String::from_utf8(body).expect("Form body should be UTF-8 here."),
			format!(
				"--{boundary}\r\n\
				 Content-Disposition: form-data; name=\"recipe_title\"\r\n\r\n\
				 Soup\r\n\
				 --{boundary}\r\n\
				 Content-Disposition: form-data; name=\"image\"; filename=\"soup.jpg\"\r\n\
				 Content-Type: image/jpeg\r\n\r\n\
				 JPEG\r\n\
				 --{boundary}--\r\n"
			),
		);
	}

	#[test]
	fn boundary_follows_contents_and_escapes_quotes() {
		let soup = MultipartForm::new().text("recipe_title", "Soup");
		let stew = MultipartForm::new().text("recipe_title", "Stew");

		assert_eq!(soup.boundary(), soup.clone().boundary());
		assert_ne!(soup.boundary(), stew.boundary());

		let quoted = MultipartForm::new()
			.file("video", FilePart::new("a\"b\r\n.mp4", "video/mp4", Vec::<u8>::new()));
		let (_, body) = quoted.encode();
		let body = String::from_utf8(body).expect("Form body should be UTF-8 here.");

		assert!(body.contains("filename=\"a%22b%0D%0A.mp4\""));
		assert_eq!(quoted.file_part("video").map(|file| file.bytes.len()), Some(0));
		assert_eq!(soup.text_value("recipe_title"), Some("Soup"));
		assert_eq!(soup.len(), 1);
		assert!(MultipartForm::new().is_empty());
	}
}
