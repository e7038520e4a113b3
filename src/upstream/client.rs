use reqwest::redirect::Policy;

/// HTTP client shared by every probe. Redirects are handed back to the
/// classifier instead of being followed.
#[derive(Clone)]
pub struct UpstreamClient {
    pub(crate) http_client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(UpstreamClient { http_client })
    }
}
