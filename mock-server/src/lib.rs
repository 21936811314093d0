use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Alive,
    Dead,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Genderless,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    pub id: u32,
    pub name: String,
    pub status: Status,
    pub species: String,
    pub gender: Gender,
    pub image: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageInfo {
    pub count: u32,
    pub pages: u32,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterPage {
    pub info: PageInfo,
    pub results: Vec<Character>,
}

/// Request as seen by the server, returned verbatim from `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub type Roster = Arc<Vec<Character>>;

pub fn roster() -> Vec<Character> {
    let character = |id: u32, name: &str, status, species: &str, gender| Character {
        id,
        name: name.to_string(),
        status,
        species: species.to_string(),
        gender,
        image: format!("/api/character/avatar/{id}.jpeg"),
    };
    vec![
        character(1, "Rick Sanchez", Status::Alive, "Human", Gender::Male),
        character(2, "Morty Smith", Status::Alive, "Human", Gender::Male),
        character(3, "Summer Smith", Status::Alive, "Human", Gender::Female),
        character(4, "Birdperson", Status::Dead, "Alien", Gender::Male),
        character(5, "Mr. Meeseeks", Status::Unknown, "Humanoid", Gender::Genderless),
    ]
}

pub fn app() -> Router {
    let roster: Roster = Arc::new(roster());
    Router::new()
        .route("/api/character", get(list_characters))
        .route("/api/character/{id}", get(get_character))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/empty", get(empty))
        .route("/text", get(text))
        .with_state(roster)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_characters(State(roster): State<Roster>) -> Json<CharacterPage> {
    Json(CharacterPage {
        info: PageInfo {
            count: roster.len() as u32,
            pages: 1,
            next: None,
            prev: None,
        },
        results: roster.as_ref().clone(),
    })
}

async fn get_character(
    State(roster): State<Roster>,
    Path(id): Path<u32>,
) -> Result<Json<Character>, (StatusCode, Json<serde_json::Value>)> {
    roster.iter().find(|c| c.id == id).cloned().map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Character not found" })),
    ))
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut headers: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    headers.sort();
    Json(Echo {
        method: method.to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn text() -> &'static str {
    "not json"
}
