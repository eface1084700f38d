//! HTTP client for a VK-style photo album API
//!
//! Every method call is a form POST to `{BASE_URL}/{method}` answered with
//! either `{"response": ...}` or `{"error": {"error_code", "error_msg"}}`.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::anyhow;
use log::info;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use ureq::unversioned::multipart::{Form, Part};

use super::{AlbumApi, AlbumError, UploadTicket};
use crate::models::{AlbumId, AlbumInfo, PhotoId};

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumsResponse {
    items: Vec<AlbumInfo>,
}

#[derive(Debug, Deserialize)]
struct UploadServerResponse {
    upload_url: String,
}

/// Body returned by the upload server after a multipart transfer
#[derive(Debug, Deserialize)]
struct TransferResponse {
    server: i64,
    photos_list: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct SavedPhoto {
    id: i64,
}

/// Blocking album API client bound to one account token
pub struct HttpAlbumClient {
    token: String,
    owner_id: i64,
}

impl HttpAlbumClient {
    const BASE_URL: &'static str = "https://api.vk.com/method";
    const API_VERSION: &'static str = "5.199";

    /// Log in with an access token and learn the owning account id
    pub fn connect(token: impl Into<String>) -> Result<Self, AlbumError> {
        let mut client = Self {
            token: token.into(),
            owner_id: 0,
        };

        let users: Vec<UserResponse> = client.call("users.get", &[])?;
        let user = users.into_iter().next().ok_or_else(|| AlbumError::MalformedResponse {
            method: "users.get".to_string(),
            detail: "empty user list".to_string(),
        })?;

        info!(
            "Logged in to album store as {} {} @id{}",
            user.first_name, user.last_name, user.id
        );
        client.owner_id = user.id;
        Ok(client)
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }

    /// Call an API method and unwrap the response envelope
    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, AlbumError> {
        let url = format!("{}/{}", Self::BASE_URL, method);

        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("access_token", self.token.clone()));
        form.push(("v", Self::API_VERSION.to_string()));

        let mut response = match ureq::post(&url).send_form(form) {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(429)) => {
                return Err(AlbumError::RateLimited(method.to_string()));
            }
            Err(e) => return Err(anyhow!("Failed to call {}: {}", method, e).into()),
        };

        let envelope: ApiEnvelope<T> =
            response
                .body_mut()
                .read_json()
                .map_err(|e| AlbumError::MalformedResponse {
                    method: method.to_string(),
                    detail: e.to_string(),
                })?;

        if let Some(error) = envelope.error {
            return Err(AlbumError::from_api(method, error.error_code, &error.error_msg));
        }

        envelope.response.ok_or_else(|| AlbumError::MalformedResponse {
            method: method.to_string(),
            detail: "missing response field".to_string(),
        })
    }

    /// POST the photo bytes to an upload URL as multipart form data
    fn transfer(&self, upload_url: &str, payload: &[u8]) -> Result<TransferResponse, AlbumError> {
        let photo = Part::bytes(payload)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| AlbumError::Transport(anyhow!("Failed to build upload form: {}", e)))?;
        let form = Form::new().part("file1", photo);

        let mut response = ureq::post(upload_url)
            .send(form)
            .map_err(|e| match e {
                ureq::Error::StatusCode(429) => AlbumError::RateLimited("upload".to_string()),
                e => AlbumError::Transport(anyhow!("Failed to transfer photo: {}", e)),
            })?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| AlbumError::MalformedResponse {
                method: "upload".to_string(),
                detail: e.to_string(),
            })
    }
}

impl AlbumApi for HttpAlbumClient {
    fn create_album(&self, title: &str) -> Result<AlbumInfo, AlbumError> {
        self.call(
            "photos.createAlbum",
            &[
                ("title", title.to_string()),
                ("privacy_view", "only_me".to_string()),
            ],
        )
    }

    fn delete_album(&self, album_id: AlbumId) -> Result<(), AlbumError> {
        let _: i64 = self.call("photos.deleteAlbum", &[("album_id", album_id.to_string())])?;
        Ok(())
    }

    fn list_albums(&self) -> Result<Vec<AlbumInfo>, AlbumError> {
        let albums: AlbumsResponse = self.call(
            "photos.getAlbums",
            &[("owner_id", self.owner_id.to_string())],
        )?;
        Ok(albums.items)
    }

    fn upload(&self, album_id: AlbumId, payload: &[u8]) -> Result<UploadTicket, AlbumError> {
        let server: UploadServerResponse = self.call(
            "photos.getUploadServer",
            &[("album_id", album_id.to_string())],
        )?;

        let transferred = self.transfer(&server.upload_url, payload)?;

        Ok(UploadTicket {
            album_id,
            server: transferred.server,
            photos_list: transferred.photos_list,
            hash: transferred.hash,
        })
    }

    fn finalize(&self, ticket: &UploadTicket, caption: &str) -> Result<PhotoId, AlbumError> {
        let saved: Vec<SavedPhoto> = self.call(
            "photos.save",
            &[
                ("album_id", ticket.album_id.to_string()),
                ("server", ticket.server.to_string()),
                ("photos_list", ticket.photos_list.clone()),
                ("hash", ticket.hash.clone()),
                ("caption", caption.to_string()),
            ],
        )?;

        saved
            .first()
            .map(|photo| PhotoId(photo.id))
            .ok_or_else(|| AlbumError::MalformedResponse {
                method: "photos.save".to_string(),
                detail: "no saved photo returned".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one request with `body` and hand back the raw request text
    fn serve_once(body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = stream.read(&mut chunk).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some(boundary) = boundary_of(&text)
                    && text.contains(&format!("--{}--", boundary))
                {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn boundary_of(request: &str) -> Option<String> {
        let start = request.find("boundary=")? + "boundary=".len();
        let end = request[start..].find("\r\n")? + start;
        Some(request[start..end].trim_matches('"').to_string())
    }

    #[test]
    fn test_transfer_sends_photo_as_multipart_file() {
        let (url, server) =
            serve_once(r#"{"server": 7, "photos_list": "[{\"photo\":\"x\"}]", "hash": "abc"}"#);
        let client = HttpAlbumClient {
            token: "token".to_string(),
            owner_id: 1,
        };

        let transferred = client.transfer(&url, b"jpeg bytes").unwrap();
        assert_eq!(transferred.server, 7);
        assert_eq!(transferred.hash, "abc");

        let request = server.join().unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert!(request.contains("name=\"file1\""));
        assert!(request.contains("filename=\"photo.jpg\""));
        assert!(lower.contains("content-type: image/jpeg"));
        assert!(request.contains("jpeg bytes"));
    }

    #[test]
    fn test_parse_error_envelope() {
        let json = r#"{"error": {"error_code": 9, "error_msg": "Flood control"}}"#;
        let envelope: ApiEnvelope<i64> = serde_json::from_str(json).unwrap();
        let error = envelope.error.unwrap();
        assert_eq!(error.error_code, 9);
        assert!(envelope.response.is_none());
    }

    #[test]
    fn test_parse_albums_response() {
        let json = r#"{"response": {"count": 1, "items": [{"id": 12, "title": "Cats", "size": 3}]}}"#;
        let envelope: ApiEnvelope<AlbumsResponse> = serde_json::from_str(json).unwrap();
        let albums = envelope.response.unwrap().items;
        assert_eq!(albums, vec![AlbumInfo::new(12, "Cats")]);
    }

    #[test]
    fn test_parse_transfer_response() {
        let json = r#"{"server": 1, "photos_list": "[{\"photo\":\"x\"}]", "aid": 5, "hash": "abc"}"#;
        let transferred: TransferResponse = serde_json::from_str(json).unwrap();
        assert_eq!(transferred.server, 1);
        assert_eq!(transferred.hash, "abc");
    }
}
