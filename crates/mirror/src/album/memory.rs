//! In-memory album store
//!
//! Keeps albums and saved photos in process and lets tests script failures
//! per operation, so retry paths can be exercised without a remote API.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{AlbumApi, AlbumError, ErrorClass, UploadTicket};
use crate::models::{AlbumId, AlbumInfo, PhotoId};

/// Album operations, used to script failures and inspect calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlbumOp {
    Create,
    Delete,
    List,
    Upload,
    Finalize,
}

impl AlbumOp {
    fn method(&self) -> &'static str {
        match self {
            Self::Create => "photos.createAlbum",
            Self::Delete => "photos.deleteAlbum",
            Self::List => "photos.getAlbums",
            Self::Upload => "photos.getUploadServer",
            Self::Finalize => "photos.save",
        }
    }
}

/// A photo saved by `finalize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub id: PhotoId,
    pub album_id: AlbumId,
    pub payload: Vec<u8>,
    pub caption: String,
}

/// In-memory implementation of AlbumApi
pub struct InMemoryAlbum {
    albums: RwLock<Vec<AlbumInfo>>,
    photos: RwLock<Vec<StoredPhoto>>,
    /// Transferred payloads waiting for finalize, keyed by ticket hash
    pending: RwLock<HashMap<String, Vec<u8>>>,
    /// One-shot failures, consumed in order per operation
    scripted: RwLock<HashMap<AlbumOp, VecDeque<ErrorClass>>>,
    /// Uploads of these payloads always fail with the given class
    poisoned_payloads: RwLock<Vec<(Vec<u8>, ErrorClass)>>,
    calls: RwLock<Vec<AlbumOp>>,
    next_id: AtomicI64,
}

impl InMemoryAlbum {
    pub fn new() -> Self {
        Self {
            albums: RwLock::new(Vec::new()),
            photos: RwLock::new(Vec::new()),
            pending: RwLock::new(HashMap::new()),
            scripted: RwLock::new(HashMap::new()),
            poisoned_payloads: RwLock::new(Vec::new()),
            calls: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Fail the next call of `op` with an error of `class`
    pub fn fail_next(&self, op: AlbumOp, class: ErrorClass) {
        let mut scripted = self.scripted.write().unwrap();
        scripted.entry(op).or_default().push_back(class);
    }

    /// Fail every upload of this exact payload
    pub fn fail_payload(&self, payload: impl Into<Vec<u8>>, class: ErrorClass) {
        self.poisoned_payloads
            .write()
            .unwrap()
            .push((payload.into(), class));
    }

    /// Add an album as if it already existed remotely
    pub fn insert_album(&self, title: &str) -> AlbumInfo {
        let album = AlbumInfo {
            id: AlbumId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            title: title.to_string(),
        };
        self.albums.write().unwrap().push(album.clone());
        album
    }

    pub fn albums(&self) -> Vec<AlbumInfo> {
        self.albums.read().unwrap().clone()
    }

    pub fn photos(&self) -> Vec<StoredPhoto> {
        self.photos.read().unwrap().clone()
    }

    pub fn photos_in(&self, album_id: AlbumId) -> Vec<StoredPhoto> {
        self.photos
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.album_id == album_id)
            .cloned()
            .collect()
    }

    /// Operations called so far, in order
    pub fn calls(&self) -> Vec<AlbumOp> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self, op: AlbumOp) -> usize {
        self.calls.read().unwrap().iter().filter(|c| **c == op).count()
    }

    /// Record a call and return a scripted failure if one is queued
    fn enter(&self, op: AlbumOp) -> Result<(), AlbumError> {
        self.calls.write().unwrap().push(op);

        let mut scripted = self.scripted.write().unwrap();
        match scripted.get_mut(&op).and_then(|queue| queue.pop_front()) {
            Some(class) => Err(AlbumError::from_class(class, op.method())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryAlbum {
    fn default() -> Self {
        Self::new()
    }
}

impl AlbumApi for InMemoryAlbum {
    fn create_album(&self, title: &str) -> Result<AlbumInfo, AlbumError> {
        self.enter(AlbumOp::Create)?;
        Ok(self.insert_album(title))
    }

    fn delete_album(&self, album_id: AlbumId) -> Result<(), AlbumError> {
        self.enter(AlbumOp::Delete)?;

        let mut albums = self.albums.write().unwrap();
        let before = albums.len();
        albums.retain(|a| a.id != album_id);
        if albums.len() == before {
            return Err(AlbumError::from_api(
                AlbumOp::Delete.method(),
                100,
                "album not found",
            ));
        }
        self.photos.write().unwrap().retain(|p| p.album_id != album_id);
        Ok(())
    }

    fn list_albums(&self) -> Result<Vec<AlbumInfo>, AlbumError> {
        self.enter(AlbumOp::List)?;
        Ok(self.albums())
    }

    fn upload(&self, album_id: AlbumId, payload: &[u8]) -> Result<UploadTicket, AlbumError> {
        self.enter(AlbumOp::Upload)?;

        let poisoned = self.poisoned_payloads.read().unwrap();
        if let Some((_, class)) = poisoned.iter().find(|(p, _)| p.as_slice() == payload) {
            return Err(AlbumError::from_class(*class, AlbumOp::Upload.method()));
        }
        drop(poisoned);

        let hash = format!("ticket-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.pending
            .write()
            .unwrap()
            .insert(hash.clone(), payload.to_vec());

        Ok(UploadTicket {
            album_id,
            server: 1,
            photos_list: "[]".to_string(),
            hash,
        })
    }

    fn finalize(&self, ticket: &UploadTicket, caption: &str) -> Result<PhotoId, AlbumError> {
        self.enter(AlbumOp::Finalize)?;

        let payload = self
            .pending
            .write()
            .unwrap()
            .remove(&ticket.hash)
            .ok_or_else(|| AlbumError::InvalidTicket(AlbumOp::Finalize.method().to_string()))?;

        let id = PhotoId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.photos.write().unwrap().push(StoredPhoto {
            id,
            album_id: ticket.album_id,
            payload,
            caption: caption.to_string(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_then_finalize_stores_photo() {
        let album = InMemoryAlbum::new();
        let info = album.create_album("Cats").unwrap();

        let ticket = album.upload(info.id, b"bytes").unwrap();
        album.finalize(&ticket, "hello").unwrap();

        let photos = album.photos_in(info.id);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].caption, "hello");
        assert_eq!(photos[0].payload, b"bytes".to_vec());
    }

    #[test]
    fn test_ticket_cannot_be_reused() {
        let album = InMemoryAlbum::new();
        let info = album.insert_album("Cats");
        let ticket = album.upload(info.id, b"x").unwrap();
        album.finalize(&ticket, "").unwrap();

        let err = album.finalize(&ticket, "").unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidTicket);
    }

    #[test]
    fn test_scripted_failure_is_one_shot() {
        let album = InMemoryAlbum::new();
        album.fail_next(AlbumOp::List, ErrorClass::RateLimited);

        let err = album.list_albums().unwrap_err();
        assert_eq!(err.class(), ErrorClass::RateLimited);
        assert!(album.list_albums().is_ok());
        assert_eq!(album.call_count(AlbumOp::List), 2);
    }

    #[test]
    fn test_poisoned_payload_always_fails() {
        let album = InMemoryAlbum::new();
        let info = album.insert_album("Cats");
        album.fail_payload(b"bad".to_vec(), ErrorClass::AccessDenied);

        for _ in 0..3 {
            let err = album.upload(info.id, b"bad").unwrap_err();
            assert_eq!(err.class(), ErrorClass::AccessDenied);
        }
        assert!(album.upload(info.id, b"good").is_ok());
    }

    #[test]
    fn test_delete_removes_album_and_photos() {
        let album = InMemoryAlbum::new();
        let info = album.insert_album("Cats");
        let ticket = album.upload(info.id, b"x").unwrap();
        album.finalize(&ticket, "").unwrap();

        album.delete_album(info.id).unwrap();
        assert!(album.albums().is_empty());
        assert!(album.photos().is_empty());
        assert!(album.delete_album(info.id).is_err());
    }
}
