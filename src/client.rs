use crate::{ApiResponseOrError, Credentials, OpenAiError};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    multipart::Form,
    Client, Method, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct OpenAiClient {
    credentials: Credentials,
    client: Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAiClient({})", self.credentials.base_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorWrapper {
    error: OpenAiError,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Empty {}

fn header_value(value: &str) -> ApiResponseOrError<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|error| OpenAiError::new(error.to_string(), "invalid_header".to_string()))
}

impl OpenAiClient {
    pub fn from_env() -> ApiResponseOrError<Self> {
        Self::new(Credentials::from_env())
    }

    pub fn new(credentials: Credentials) -> ApiResponseOrError<Self> {
        let mut headers = HeaderMap::new();
        if credentials.api_version().is_some() {
            headers.insert(
                HeaderName::from_static("api-key"),
                header_value(credentials.api_key())?,
            );
        } else {
            headers.insert(
                AUTHORIZATION,
                header_value(&format!("Bearer {}", credentials.api_key()))?,
            );
        }
        headers.insert(
            HeaderName::from_static("openai-beta"),
            HeaderValue::from_static("assistants=v2"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            credentials,
            client,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn builder(&self, method: &Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method.clone(), url);
        match self.credentials.api_version() {
            Some(version) => request.query(&[("api-version", version)]),
            None => request,
        }
    }

    async fn request_inner<S, R>(
        &self,
        method: Method,
        route: R,
        body: Option<S>,
    ) -> Result<Response, reqwest::Error>
    where
        R: Into<String>,
        S: Serialize,
    {
        let url = format!("{}{}", self.credentials.base_url(), route.into());
        log::debug!("OpenAI Request[{}] {}", method, url);

        let mut request = self.builder(&method, &url);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;

        log::debug!(
            "OpenAI Response[{}] {} {url}",
            method,
            response.status().as_str()
        );
        Ok(response)
    }

    async fn parse_response<T>(response: Response) -> ApiResponseOrError<T>
    where
        T: DeserializeOwned,
    {
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }

        let result = response.text().await?;
        if let Ok(api_response) = serde_json::from_str::<OpenAiErrorWrapper>(&result) {
            Err(api_response.error)
        } else {
            Err(OpenAiError::new(result, "unknown".to_string()))
        }
    }

    pub async fn request<S, R, T>(
        &self,
        method: Method,
        route: R,
        body: Option<S>,
    ) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        let response = self.request_inner(method, route, body).await?;
        Self::parse_response(response).await
    }

    pub async fn get<R, T>(&self, route: R) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        self.request::<(), R, T>(Method::GET, route, None).await
    }

    pub async fn post<S, R, T>(&self, route: R, body: S) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        self.request(Method::POST, route, Some(body)).await
    }

    pub async fn delete<R>(&self, route: R) -> ApiResponseOrError<Empty>
    where
        R: Into<String>,
    {
        self.request::<(), R, Empty>(Method::DELETE, route, None)
            .await
    }

    pub async fn post_multipart<R, T>(&self, route: R, form: Form) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.credentials.base_url(), route.into());
        log::debug!("OpenAI Request[POST multipart] {}", url);

        let response = self
            .builder(&Method::POST, &url)
            .multipart(form)
            .send()
            .await?;

        log::debug!(
            "OpenAI Response[POST multipart] {} {url}",
            response.status().as_str()
        );
        Self::parse_response(response).await
    }

    /// Fetches every page of a list endpoint in ascending order.
    pub async fn list<R, T>(&self, route: R) -> ApiResponseOrError<Vec<T>>
    where
        R: Into<String>,
        T: DeserializeOwned + std::fmt::Debug,
    {
        let route = route.into();
        let mut after: Option<String> = None;
        let mut data = Vec::new();

        loop {
            let page_route = match &after {
                Some(after) => format!("{route}?order=asc&limit={PAGE_LIMIT}&after={after}"),
                None => format!("{route}?order=asc&limit={PAGE_LIMIT}"),
            };
            let page: List<T> = self.get(page_route).await?;
            data.extend(page.data);

            match page.last_id {
                Some(last_id) if page.has_more => after = Some(last_id),
                _ => break,
            }
        }

        Ok(data)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct List<T> {
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub data: Vec<T>,
    pub has_more: bool,
}
