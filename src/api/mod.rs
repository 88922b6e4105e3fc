//! Advent of Code endpoint layer.
//!
//! Thin caller policy on top of the broker: it decides which URL and payload
//! each operation needs, attaches the identifying headers, and interprets
//! submission responses. All pacing is left to the broker.

use http::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use url::Url;

use crate::broker::RequestBroker;
use crate::category::Category;
use crate::pending::CallError;
use crate::transport::{TransportRequest, TransportResponse};

/// Identifying User-Agent sent with every request, as adventofcode.com asks
/// automated clients to do.
pub const CLIENT_USER_AGENT: &str = "aoc-broker; https://github.com/aoc-broker/aoc-broker";

const DAY_URL: &str = "https://adventofcode.com/{year}/day/{day}";
const INPUT_URL: &str = "https://adventofcode.com/{year}/day/{day}/input";
const ANSWER_URL: &str = "https://adventofcode.com/{year}/day/{day}/answer";
const EVENTS_URL: &str = "https://adventofcode.com/events";
const PERSONAL_STATS_URL: &str = "https://adventofcode.com/{year}/leaderboard/self";

/// Errors surfaced by the endpoint layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid puzzle date: year {year}, day {day}")]
    InvalidDate { year: i32, day: u32 },
    #[error("url construction failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header value for '{0}'")]
    InvalidHeader(String),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("unexpected status {status} from {context}")]
    UnexpectedStatus { status: u16, context: &'static str },
}

/// Puzzle part, the `level` field of an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    First,
    Second,
}

impl Part {
    pub fn level(self) -> u8 {
        match self {
            Part::First => 1,
            Part::Second => 2,
        }
    }
}

/// Meaningful classification of an answer-submission response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Correct,
    Incorrect,
    AlreadySolved,
    TooRecent,
    Undefined,
}

impl SubmitStatus {
    /// Classifies a raw submission response body by its marker phrases.
    pub fn from_response(body: &str) -> Self {
        if body.contains("You don't seem to be solving the right level") {
            SubmitStatus::AlreadySolved
        } else if body.contains("That's the right answer!") {
            SubmitStatus::Correct
        } else if body.contains("That's not the right answer") {
            SubmitStatus::Incorrect
        } else if body.contains("You gave an answer too recently") {
            SubmitStatus::TooRecent
        } else {
            SubmitStatus::Undefined
        }
    }
}

fn check_date(year: i32, day: u32) -> Result<(), ApiError> {
    if year == 0 || day == 0 {
        return Err(ApiError::InvalidDate { year, day });
    }
    Ok(())
}

fn day_url(template: &str, year: i32, day: u32) -> Result<Url, ApiError> {
    let rendered = template
        .replace("{year}", &year.to_string())
        .replace("{day}", &day.to_string());
    Ok(Url::parse(&rendered)?)
}

fn year_url(template: &str, year: i32) -> Result<Url, ApiError> {
    Ok(Url::parse(&template.replace("{year}", &year.to_string()))?)
}

/// Client for the Advent of Code website, routing every call through a
/// [`RequestBroker`].
pub struct AocClient {
    broker: RequestBroker,
    session_cookie: String,
}

impl AocClient {
    /// `session_cookie` is the full cookie header value for a logged-in
    /// session, e.g. `"session=53616c..."`.
    pub fn new(broker: RequestBroker, session_cookie: String) -> Self {
        Self {
            broker,
            session_cookie,
        }
    }

    /// Downloads the puzzle input for a day. Any status other than 200 means
    /// the input is not available (wrong date, expired session) and is
    /// rejected.
    pub async fn download_input(&self, year: i32, day: u32) -> Result<String, ApiError> {
        check_date(year, day)?;
        let request = self.get_request(day_url(INPUT_URL, year, day)?)?;
        let response = self.call(request, Category::InputFetch).await?;
        if response.status != 200 {
            log::warn!(
                "input download for {year}/{day} returned status {}: {}",
                response.status,
                response.body
            );
            return Err(ApiError::UnexpectedStatus {
                status: response.status,
                context: "input download",
            });
        }
        Ok(response.body)
    }

    /// Offers an answer and classifies the server's verdict.
    pub async fn submit_answer(
        &self,
        year: i32,
        day: u32,
        part: Part,
        answer: &str,
    ) -> Result<SubmitStatus, ApiError> {
        check_date(year, day)?;
        let body = format!("level={}&answer={}", part.level(), answer);
        let request = TransportRequest::post(day_url(ANSWER_URL, year, day)?, body)
            .with_header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_header(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT))
            .with_header(COOKIE, self.cookie_value()?);

        let response = self.call(request, Category::Submit).await?;
        let status = SubmitStatus::from_response(&response.body);
        if status == SubmitStatus::Undefined {
            log::warn!("unrecognised submission response: {}", response.body);
        }
        Ok(status)
    }

    /// Downloads the whole task page, e.g. to scan for already-solved parts.
    pub async fn fetch_task_page(
        &self,
        year: i32,
        day: u32,
    ) -> Result<TransportResponse, ApiError> {
        check_date(year, day)?;
        let request = self.get_request(day_url(DAY_URL, year, day)?)?;
        self.call(request, Category::TaskPageFetch).await
    }

    /// Downloads the events overview page.
    pub async fn fetch_event_page(&self) -> Result<TransportResponse, ApiError> {
        let request = self.get_request(Url::parse(EVENTS_URL)?)?;
        self.call(request, Category::EventPageFetch).await
    }

    /// Downloads the personal leaderboard page for a year.
    pub async fn fetch_personal_stats(&self, year: i32) -> Result<TransportResponse, ApiError> {
        let request = self.get_request(year_url(PERSONAL_STATS_URL, year)?)?;
        self.call(request, Category::PersonalStats).await
    }

    fn cookie_value(&self) -> Result<HeaderValue, ApiError> {
        HeaderValue::from_str(&self.session_cookie)
            .map_err(|_| ApiError::InvalidHeader("cookie".to_string()))
    }

    fn get_request(&self, url: Url) -> Result<TransportRequest, ApiError> {
        Ok(TransportRequest::get(url)
            .with_header(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT))
            .with_header(COOKIE, self.cookie_value()?))
    }

    async fn call(
        &self,
        request: TransportRequest,
        category: Category,
    ) -> Result<TransportResponse, ApiError> {
        let mut handle = self.broker.submit(request, category);
        Ok(handle.wait().await?)
    }
}
