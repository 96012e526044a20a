//! Feed, post, and interaction endpoints plus the cursor pager used for infinite scrolling.

// std
use std::str::FromStr;
// self
use crate::{
	_prelude::*,
	auth::UserProfile,
	client::{ApiClient, ApiRequest, FilePart, MultipartForm},
	http::ApiHttpClient,
};

/// Page size used when the caller does not pick one.
pub const DEFAULT_FEED_LIMIT: u32 = 10;
/// Largest page size the backend accepts.
pub const MAX_FEED_LIMIT: u32 = 50;

/// Recipe post as rendered in the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
	/// Post identifier (UUID).
	pub id: String,
	/// Free-text body.
	#[serde(default)]
	pub content: Option<String>,
	/// Recipe title.
	#[serde(default)]
	pub recipe_title: Option<String>,
	/// Ingredient list.
	#[serde(default)]
	pub ingredients: Option<String>,
	/// Preparation steps.
	#[serde(default)]
	pub instructions: Option<String>,
	/// Cooking time in minutes.
	#[serde(default)]
	pub cooking_time: Option<u32>,
	/// Number of servings.
	#[serde(default)]
	pub servings: Option<u32>,
	/// Difficulty label.
	#[serde(default)]
	pub difficulty: Option<Difficulty>,
	/// Cuisine label.
	#[serde(default)]
	pub cuisine_type: Option<String>,
	/// Visibility flag.
	#[serde(default = "visible")]
	pub is_public: bool,
	/// Presigned image URL.
	#[serde(default)]
	pub image_url: Option<String>,
	/// Presigned video URL.
	#[serde(default)]
	pub video_url: Option<String>,
	/// Like counter.
	#[serde(default)]
	pub likes_count: u64,
	/// Comment counter.
	#[serde(default)]
	pub comments_count: u64,
	/// Save counter.
	#[serde(default)]
	pub saves_count: u64,
	/// Creation timestamp as sent by the backend.
	#[serde(default)]
	pub created_at: Option<String>,
	/// Post author.
	#[serde(default)]
	pub author: Option<UserProfile>,
	/// Whether the current user liked the post.
	#[serde(default)]
	pub is_liked: Option<bool>,
	/// Whether the current user saved the post.
	#[serde(default)]
	pub is_saved: Option<bool>,
}

fn visible() -> bool {
	true
}

/// One page of the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
	/// Posts, newest first.
	pub posts: Vec<Post>,
	/// Whether another page exists.
	pub has_more: bool,
	/// Cursor for the next page.
	#[serde(default)]
	pub next_cursor: Option<String>,
	/// Total number of posts, when the backend computed it.
	#[serde(default)]
	pub total_count: Option<u64>,
}

/// Result of `POST /posts/{id}/like`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
	/// Like state after the toggle.
	pub liked: bool,
	/// Updated counter.
	pub likes_count: u64,
}

/// Result of `POST /posts/{id}/save`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveToggle {
	/// Save state after the toggle.
	pub saved: bool,
	/// Updated counter.
	pub saves_count: u64,
}

/// Recipe difficulty accepted by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
	/// `easy`
	Easy,
	/// `medium`
	Medium,
	/// `hard`
	Hard,
}
impl Difficulty {
	/// Lowercase label used on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Difficulty::Easy => "easy",
			Difficulty::Medium => "medium",
			Difficulty::Hard => "hard",
		}
	}
}
impl FromStr for Difficulty {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"easy" => Ok(Self::Easy),
			"medium" => Ok(Self::Medium),
			"hard" => Ok(Self::Hard),
			_ => Err(Error::InvalidInput {
				reason: "Difficulty must be easy, medium, or hard".into(),
			}),
		}
	}
}
impl Display for Difficulty {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Rejection text for a post without text or media.
pub const EMPTY_POST_MESSAGE: &str = "Post must have at least content, recipe title, or media";
/// Rejection text for a post carrying both an image and a video.
pub const MIXED_MEDIA_MESSAGE: &str = "Please upload either an image or video, not both";

/// Payload for `POST /posts/`, sent as `multipart/form-data`.
///
/// Unset and empty fields are left out of the form. At most one of `image` and `video` may be
/// attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
	/// Free-text body.
	pub content: Option<String>,
	/// Recipe title.
	pub recipe_title: Option<String>,
	/// Ingredient list.
	pub ingredients: Option<String>,
	/// Preparation steps.
	pub instructions: Option<String>,
	/// Cooking time in minutes; must be positive.
	pub cooking_time: Option<i64>,
	/// Number of servings; must be positive.
	pub servings: Option<i64>,
	/// Difficulty label.
	pub difficulty: Option<Difficulty>,
	/// Cuisine label.
	pub cuisine_type: Option<String>,
	/// Visibility flag.
	pub is_public: bool,
	/// Attached photo.
	pub image: Option<FilePart>,
	/// Attached clip.
	pub video: Option<FilePart>,
}
impl NewPost {
	/// Starts a public recipe post.
	pub fn recipe(title: impl Into<String>) -> Self {
		Self { recipe_title: Some(title.into()), ..Default::default() }
	}

	/// Starts a public post with body text only.
	pub fn note(content: impl Into<String>) -> Self {
		Self { content: Some(content.into()), ..Default::default() }
	}

	/// Sets the body text.
	pub fn content(mut self, content: impl Into<String>) -> Self {
		self.content = Some(content.into());

		self
	}

	/// Sets the ingredient list.
	pub fn ingredients(mut self, ingredients: impl Into<String>) -> Self {
		self.ingredients = Some(ingredients.into());

		self
	}

	/// Sets the preparation steps.
	pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
		self.instructions = Some(instructions.into());

		self
	}

	/// Sets the cooking time in minutes.
	pub fn cooking_time(mut self, minutes: i64) -> Self {
		self.cooking_time = Some(minutes);

		self
	}

	/// Sets the number of servings.
	pub fn servings(mut self, servings: i64) -> Self {
		self.servings = Some(servings);

		self
	}

	/// Sets the difficulty.
	pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
		self.difficulty = Some(difficulty);

		self
	}

	/// Sets the cuisine label.
	pub fn cuisine(mut self, cuisine: impl Into<String>) -> Self {
		self.cuisine_type = Some(cuisine.into());

		self
	}

	/// Marks the post private.
	pub fn private(mut self) -> Self {
		self.is_public = false;

		self
	}

	/// Attaches a photo.
	pub fn image(mut self, image: FilePart) -> Self {
		self.image = Some(image);

		self
	}

	/// Attaches a clip.
	pub fn video(mut self, video: FilePart) -> Self {
		self.video = Some(video);

		self
	}

	/// Applies the backend's field rules locally.
	pub fn validate(&self) -> Result<()> {
		let has_text = |field: &Option<String>| {
			field.as_deref().is_some_and(|value| !value.trim().is_empty())
		};

		if !has_text(&self.content)
			&& !has_text(&self.recipe_title)
			&& self.image.is_none()
			&& self.video.is_none()
		{
			return Err(Error::InvalidInput { reason: EMPTY_POST_MESSAGE.into() });
		}
		if self.image.is_some() && self.video.is_some() {
			return Err(Error::InvalidInput { reason: MIXED_MEDIA_MESSAGE.into() });
		}
		if self.cooking_time.is_some_and(|minutes| minutes <= 0) {
			return Err(Error::InvalidInput { reason: "Cooking time must be positive".into() });
		}
		if self.servings.is_some_and(|servings| servings <= 0) {
			return Err(Error::InvalidInput { reason: "Servings must be positive".into() });
		}

		Ok(())
	}

	/// Builds the form sent to the backend.
	pub fn to_form(&self) -> MultipartForm {
		let texts = [
			("content", self.content.clone()),
			("recipe_title", self.recipe_title.clone()),
			("ingredients", self.ingredients.clone()),
			("instructions", self.instructions.clone()),
			("cooking_time", self.cooking_time.map(|minutes| minutes.to_string())),
			("servings", self.servings.map(|servings| servings.to_string())),
			("difficulty", self.difficulty.map(|difficulty| difficulty.as_str().to_owned())),
			("cuisine_type", self.cuisine_type.clone()),
			("is_public", Some(self.is_public.to_string())),
		];
		let mut form = MultipartForm::new();

		for (name, value) in texts {
			if let Some(value) = value.filter(|value| !value.is_empty()) {
				form = form.text(name, value);
			}
		}
		if let Some(image) = &self.image {
			form = form.file("image", image.clone());
		}
		if let Some(video) = &self.video {
			form = form.file("video", video.clone());
		}

		form
	}
}
impl Default for NewPost {
	fn default() -> Self {
		Self {
			content: None,
			recipe_title: None,
			ingredients: None,
			instructions: None,
			cooking_time: None,
			servings: None,
			difficulty: None,
			cuisine_type: None,
			is_public: true,
			image: None,
			video: None,
		}
	}
}

impl<C> ApiClient<C>
where
	C: ApiHttpClient,
{
	/// Fetches one feed page. `limit` is clamped to `1..=50` and defaults to 10.
	pub async fn feed(&self, cursor: Option<&str>, limit: Option<u32>) -> Result<FeedPage> {
		let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
		let mut request = ApiRequest::get(self.descriptor().endpoints.feed.as_str());

		if let Some(cursor) = cursor.filter(|cursor| !cursor.trim().is_empty()) {
			request = request.query("cursor", cursor);
		}

		self.send_json(request.query("limit", limit)).await
	}

	/// Fetches a single post.
	pub async fn post(&self, id: &str) -> Result<Post> {
		self.get_json(&self.post_path(id, None)?).await
	}

	/// Publishes a post as `multipart/form-data` after local validation.
	pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
		post.validate()?;

		let path = format!("{}/", self.descriptor().endpoints.posts.trim_end_matches('/'));

		self.send_json(ApiRequest::post(path).multipart(post.to_form())).await
	}

	/// Toggles the current user's like on a post.
	pub async fn toggle_like(&self, id: &str) -> Result<LikeToggle> {
		self.send_json(ApiRequest::post(self.post_path(id, Some("like"))?)).await
	}

	/// Toggles the current user's save on a post.
	pub async fn toggle_save(&self, id: &str) -> Result<SaveToggle> {
		self.send_json(ApiRequest::post(self.post_path(id, Some("save"))?)).await
	}

	fn post_path(&self, id: &str, action: Option<&str>) -> Result<String> {
		let id = id.trim();

		if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
			return Err(Error::InvalidInput { reason: format!("post id {id:?} is invalid") });
		}

		let root = self.descriptor().endpoints.posts.trim_end_matches('/');

		Ok(match action {
			Some(action) => format!("{root}/{id}/{action}"),
			None => format!("{root}/{id}"),
		})
	}
}

/// Cursor state for an infinitely scrolling feed.
#[derive(Clone, Debug)]
pub struct FeedPager {
	posts: Vec<Post>,
	cursor: Option<String>,
	has_more: bool,
	loading: bool,
	limit: u32,
}
impl FeedPager {
	/// Creates an empty pager requesting `limit` posts per page.
	pub fn new(limit: u32) -> Self {
		Self {
			posts: Vec::new(),
			cursor: None,
			has_more: true,
			loading: false,
			limit: limit.clamp(1, MAX_FEED_LIMIT),
		}
	}

	/// Loaded posts in display order.
	pub fn posts(&self) -> &[Post] {
		&self.posts
	}

	/// Whether another page may exist.
	pub fn has_more(&self) -> bool {
		self.has_more
	}

	/// Whether a page request is outstanding.
	pub fn is_loading(&self) -> bool {
		self.loading
	}

	/// Marks a page request as started, returning its cursor.
	///
	/// Returns `None` while another page is loading or once the feed is exhausted.
	pub fn begin_load(&mut self) -> Option<Option<String>> {
		if self.loading || !self.has_more {
			return None;
		}

		self.loading = true;

		Some(self.cursor.clone())
	}

	/// Appends a fetched page and advances the cursor.
	pub fn finish_load(&mut self, page: FeedPage) -> usize {
		let added = page.posts.len();

		self.loading = false;
		self.has_more = page.has_more && page.next_cursor.is_some();
		self.cursor = page.next_cursor;
		self.posts.extend(page.posts);

		added
	}

	/// Clears the loading flag after a failed request so it can be retried.
	pub fn abort_load(&mut self) {
		self.loading = false;
	}

	/// Loads the next page through `client`; returns the number of posts added.
	pub async fn load_more<C>(&mut self, client: &ApiClient<C>) -> Result<usize>
	where
		C: ApiHttpClient,
	{
		let Some(cursor) = self.begin_load() else {
			return Ok(0);
		};

		match client.feed(cursor.as_deref(), Some(self.limit)).await {
			Ok(page) => Ok(self.finish_load(page)),
			Err(err) => {
				self.abort_load();

				Err(err)
			},
		}
	}

	/// Applies a like toggle to the loaded copy of post `id`.
	pub fn apply_like(&mut self, id: &str, toggle: LikeToggle) -> bool {
		self.update(id, |post| {
			post.is_liked = Some(toggle.liked);
			post.likes_count = toggle.likes_count;
		})
	}

	/// Applies a save toggle to the loaded copy of post `id`.
	pub fn apply_save(&mut self, id: &str, toggle: SaveToggle) -> bool {
		self.update(id, |post| {
			post.is_saved = Some(toggle.saved);
			post.saves_count = toggle.saves_count;
		})
	}

	/// Drops every loaded page (e.g. on logout).
	pub fn reset(&mut self) {
		*self = Self::new(self.limit);
	}

	fn update(&mut self, id: &str, apply: impl FnOnce(&mut Post)) -> bool {
		match self.posts.iter_mut().find(|post| post.id == id) {
			Some(post) => {
				apply(post);

				true
			},
			None => false,
		}
	}
}
impl Default for FeedPager {
	fn default() -> Self {
		Self::new(DEFAULT_FEED_LIMIT)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn page(ids: &[&str], next: Option<&str>) -> FeedPage {
		serde_json::from_value(json!({
			"posts": ids
				.iter()
				.map(|id| json!({ "id": id, "likes_count": 0, "saves_count": 0 }))
				.collect::<Vec<_>>(),
			"has_more": next.is_some(),
			"next_cursor": next,
		}))
		.expect("Feed fixture should decode.")
	}

	#[test]
	fn post_decodes_backend_shape() {
		let post: Post = serde_json::from_value(json!({
			"id": "0b7a6c1e-7a1f-4c59-9b43-2f0d7f1f2a10",
			"recipe_title": "Shakshuka",
			"difficulty": "medium",
			"likes_count": 4,
			"comments_count": 1,
			"saves_count": 2,
			"created_at": "2025-03-01T10:00:00.123456",
			"author": { "id": 1, "username": "alice" },
			"is_liked": true
		}))
		.expect("Post should decode.");

		assert_eq!(post.difficulty, Some(Difficulty::Medium));
		assert!(post.is_public);
		assert_eq!(post.author.as_ref().and_then(UserProfile::username), Some("alice"));
	}

	#[test]
	fn new_post_validation_mirrors_backend() {
		assert!(NewPost::recipe("Soup").cooking_time(20).servings(2).validate().is_ok());

		let err = NewPost::recipe("Soup")
			.cooking_time(0)
			.validate()
			.expect_err("Zero cooking time should be rejected.");

		assert_eq!(err.user_message("Failed"), "Cooking time must be positive");
		assert!(NewPost::recipe("Soup").servings(-1).validate().is_err());
		assert_eq!("HARD".parse::<Difficulty>().expect("Difficulty should parse."), Difficulty::Hard);
		assert!("extreme".parse::<Difficulty>().is_err());
	}

	#[test]
	fn post_needs_text_or_exactly_one_medium() {
		let photo = FilePart::new("soup.jpg", "image/jpeg", b"JPEG".to_vec());
		let clip = FilePart::new("soup.mp4", "video/mp4", b"MP4".to_vec());
		let err = NewPost::default()
			.cuisine("Thai")
			.validate()
			.expect_err("A post without text or media should be rejected.");

		assert_eq!(err.user_message("Failed"), EMPTY_POST_MESSAGE);
		assert!(NewPost::recipe("  ").validate().is_err());
		assert!(NewPost::note("Dinner").validate().is_ok());
		assert!(NewPost::default().image(photo.clone()).validate().is_ok());
		assert!(NewPost::default().video(clip.clone()).validate().is_ok());

		let err = NewPost::recipe("Soup")
			.image(photo)
			.video(clip)
			.validate()
			.expect_err("Image and video together should be rejected.");

		assert_eq!(err.user_message("Failed"), MIXED_MEDIA_MESSAGE);
	}

	#[test]
	fn form_skips_unset_fields_and_attaches_media() {
		let form = NewPost::recipe("Soup")
			.content("")
			.difficulty(Difficulty::Easy)
			.cooking_time(20)
			.private()
			.image(FilePart::new("soup.jpg", "image/jpeg", b"JPEG".to_vec()))
			.to_form();

		assert_eq!(form.text_value("recipe_title"), Some("Soup"));
		assert_eq!(form.text_value("difficulty"), Some("easy"));
		assert_eq!(form.text_value("cooking_time"), Some("20"));
		assert_eq!(form.text_value("is_public"), Some("false"));
		assert_eq!(form.text_value("content"), None);
		assert_eq!(form.text_value("servings"), None);
		assert_eq!(form.file_part("image").map(|file| file.filename.as_str()), Some("soup.jpg"));
		assert_eq!(form.file_part("video"), None);
		assert_eq!(form.len(), 5);
		assert_eq!(NewPost::note("Hi").to_form().text_value("is_public"), Some("true"));
	}

	#[test]
	fn pager_gates_loads_and_tracks_cursor() {
		let mut pager = FeedPager::default();

		assert_eq!(pager.begin_load(), Some(None));
		assert_eq!(pager.begin_load(), None);
		assert_eq!(pager.finish_load(page(&["p1", "p2"], Some("p2"))), 2);
		assert_eq!(pager.begin_load(), Some(Some("p2".into())));
		assert_eq!(pager.finish_load(page(&["p3"], None)), 1);
		assert!(!pager.has_more());
		assert_eq!(pager.begin_load(), None);
		assert_eq!(
			pager.posts().iter().map(|post| post.id.as_str()).collect::<Vec<_>>(),
			["p1", "p2", "p3"],
		);
	}

	#[test]
	fn pager_applies_toggles_in_place() {
		let mut pager = FeedPager::new(500);

		pager.begin_load();
		pager.finish_load(page(&["p1"], None));

		assert!(pager.apply_like("p1", LikeToggle { liked: true, likes_count: 1 }));
		assert!(pager.apply_save("p1", SaveToggle { saved: true, saves_count: 3 }));
		assert!(!pager.apply_like("missing", LikeToggle { liked: true, likes_count: 1 }));
		assert_eq!(pager.posts()[0].is_liked, Some(true));
		assert_eq!(pager.posts()[0].saves_count, 3);

		pager.reset();

		assert!(pager.posts().is_empty());
		assert!(pager.has_more());
	}
}
