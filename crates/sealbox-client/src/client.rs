//! The sealbox HTTP client
//!
//! Composes the cipher engine around the server's JSON/multipart
//! surface. All encryption happens here, client-side: the server
//! receives only ciphertext, 800-byte KEM payloads, and fingerprints.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::keystore::Keystore;
use crate::types::*;
use sealbox_crypto::{
    Fingerprint, KemPayload, KyberPublicKey, Phase, decrypt_and_unwrap, encrypt_and_wrap, rewrap,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Progress callback for upload/receive pipelines
pub type Progress<'a> = &'a (dyn Fn(Phase) + Send + Sync);

fn report(progress: Option<Progress<'_>>, phase: Phase) {
    if let Some(f) = progress {
        f(phase);
    }
}

/// Client for one sealbox server and one local keystore
pub struct SealboxClient {
    http: reqwest::Client,
    base_url: String,
    keystore: Keystore,
    token: Option<String>,
    researcher_id: Option<String>,
}

impl SealboxClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keystore: Keystore::open(config.keystore_dir)?,
            token: None,
            researcher_id: None,
        })
    }

    /// The identity this client is logged in as
    pub fn researcher_id(&self) -> Result<&str> {
        self.researcher_id
            .as_deref()
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Access the local keystore
    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ClientError::NotAuthenticated)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.json::<ErrorBody>().await.unwrap_or(ErrorBody {
            error: "Internal".to_string(),
            message: "unreadable error response".to_string(),
        });
        Err(ClientError::Api {
            status,
            code: body.error,
            message: body.message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    // ---- Identity & keys ----------------------------------------------

    /// Register a new identity
    ///
    /// Generates (or reuses) the local keypair and registers its public
    /// half in the same request.
    pub async fn register(&mut self, researcher_id: &str, password: &str) -> Result<AuthResponse> {
        let (pair, _) = self.keystore.ensure(researcher_id)?;
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&RegisterRequest {
                researcher_id: researcher_id.to_string(),
                password: password.to_string(),
                public_key: Some(pair.public_key().to_base64()),
            })
            .send()
            .await?;
        let auth: AuthResponse = Self::check(response).await?.json().await?;
        self.token = Some(auth.token.clone());
        self.researcher_id = Some(auth.researcher_id.clone());
        Ok(auth)
    }

    /// Log in and bootstrap the local keystore
    ///
    /// On the first authentication of an identity with no key anywhere,
    /// a fresh keypair is generated, persisted locally, and its public
    /// half uploaded. When the registry already holds a key but this
    /// host has no keystore entry, nothing is generated: a regenerated
    /// keypair would orphan every past share, so receive and re-share
    /// operations fail with `NoKeypair` until the keystore is restored
    /// or a new key is registered explicitly.
    pub async fn login(&mut self, researcher_id: &str, password: &str) -> Result<AuthResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest {
                researcher_id: researcher_id.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let auth: AuthResponse = Self::check(response).await?.json().await?;
        self.token = Some(auth.token.clone());
        self.researcher_id = Some(auth.researcher_id.clone());

        if self.keystore.has(researcher_id) {
            if !auth.has_public_key {
                let pair = self.keystore.require(researcher_id)?;
                self.set_public_key(pair.public_key()).await?;
            }
        } else if !auth.has_public_key {
            let (pair, _) = self.keystore.ensure(researcher_id)?;
            self.set_public_key(pair.public_key()).await?;
        } else {
            tracing::warn!(
                researcher_id = %researcher_id,
                "registry holds a public key but this host has no keystore entry"
            );
        }

        Ok(auth)
    }

    /// Generate and register a brand-new keypair for the caller
    ///
    /// Explicit recovery for a lost keystore. Every share wrapped to
    /// the previous key becomes permanently undecryptable.
    pub async fn register_fresh_key(&mut self) -> Result<()> {
        let id = self.researcher_id()?.to_string();
        let pair = sealbox_crypto::generate_keypair()?;
        self.keystore.put(&id, &pair)?;
        self.set_public_key(pair.public_key()).await?;
        tracing::warn!(researcher_id = %id, "registered a fresh keypair; prior shares are orphaned");
        Ok(())
    }

    /// Log out, destroying the server-side session
    ///
    /// The local keystore is deliberately left intact.
    pub async fn logout(&mut self) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/auth/logout"))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Self::check(response).await?;
        self.token = None;
        self.researcher_id = None;
        Ok(())
    }

    /// Fetch the current session snapshot
    pub async fn session(&self) -> Result<SessionInfo> {
        self.get_json("/api/auth/session").await
    }

    /// Upload the caller's public key to the registry
    pub async fn set_public_key(&self, public_key: &KyberPublicKey) -> Result<()> {
        let response = self
            .http
            .put(self.url("/api/keys"))
            .bearer_auth(self.bearer()?)
            .json(&SetPublicKeyRequest {
                public_key: public_key.to_base64(),
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Fetch a named identity's Kyber public key
    pub async fn lookup_public_key(&self, researcher_id: &str) -> Result<KyberPublicKey> {
        let response = self
            .http
            .get(self.url(&format!("/api/keys/{}", researcher_id)))
            .send()
            .await?;
        let body: PublicKeyResponse = Self::check(response).await?.json().await?;
        Ok(KyberPublicKey::from_base64(&body.public_key)?)
    }

    /// Prefix-search identities
    pub async fn search(&self, prefix: &str) -> Result<Vec<IdentityMatch>> {
        // Prefixes may contain any printable character; let the query
        // builder do the escaping
        let response = self
            .http
            .get(self.url("/api/identities"))
            .query(&[("prefix", prefix)])
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let body: SearchResponse = Self::check(response).await?.json().await?;
        Ok(body.identities)
    }

    // ---- Files --------------------------------------------------------

    /// Encrypt a plaintext and upload it
    ///
    /// Runs the full pipeline: DEK draw, IV draw, AES-GCM encrypt,
    /// fingerprint, owner wrap, multipart upload.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        plaintext: &[u8],
        progress: Option<Progress<'_>>,
    ) -> Result<FileMeta> {
        let id = self.researcher_id()?;
        let pair = self.keystore.require(id)?;

        let engine_progress = |phase: Phase| report(progress, phase);
        let enc = encrypt_and_wrap(plaintext, pair.public_key(), Some(&engine_progress))?;

        report(progress, Phase::Upload);
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(enc.ciphertext)
                    .file_name(file_name.to_string())
                    .mime_str("application/octet-stream")?,
            )
            .text("fileName", file_name.to_string())
            .text("originalSize", enc.original_size.to_string())
            .text("iv", enc.iv.to_base64())
            .text("sha256Hash", enc.fingerprint.to_hex())
            .text("contentType", content_type.to_string())
            .text("ownerKemCt", enc.owner_wrap.to_base64());

        let response = self
            .http
            .post(self.url("/api/files"))
            .bearer_auth(self.bearer()?)
            .multipart(form)
            .send()
            .await?;
        let meta: FileMeta = Self::check(response).await?.json().await?;

        report(progress, Phase::Done);
        tracing::debug!(file_id = meta.file_id, "uploaded");
        Ok(meta)
    }

    /// The caller's own files
    pub async fn my_files(&self) -> Result<Vec<FileMeta>> {
        let body: FileListResponse = self.get_json("/api/files").await?;
        Ok(body.files)
    }

    /// Metadata for one file
    pub async fn file_metadata(&self, file_id: u64) -> Result<FileMeta> {
        self.get_json(&format!("/api/files/{}", file_id)).await
    }

    /// Download the raw `IV ∥ ct ∥ tag` blob
    pub async fn download_blob(&self, file_id: u64) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url(&format!("/api/files/{}/blob", file_id)))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes().await?.to_vec())
    }

    /// Download and decrypt one of the caller's own files via the
    /// owner wrap
    pub async fn download_own_file(
        &self,
        file_id: u64,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let id = self.researcher_id()?;
        let pair = self.keystore.require(id)?;

        let meta = self.file_metadata(file_id).await?;
        let owner_wrap = meta
            .owner_wrap
            .as_deref()
            .ok_or(ClientError::NotOwner(file_id))?;
        let payload = KemPayload::from_base64(owner_wrap)?;
        let fingerprint = Fingerprint::from_hex(&meta.sha256_hash)?;

        report(progress, Phase::Download);
        let blob = self.download_blob(file_id).await?;

        report(progress, Phase::Decrypt);
        let plaintext =
            decrypt_and_unwrap(&payload, pair.secret_key(), &blob, Some(&fingerprint))?;
        report(progress, Phase::Done);
        Ok(plaintext)
    }

    /// Delete one of the caller's files; cascades its shares
    pub async fn delete_file(&self, file_id: u64) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/api/files/{}", file_id)))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // ---- Shares -------------------------------------------------------

    /// Recover this file's DEK through the caller's owner wrap
    async fn owner_dek_payload(&self, file_id: u64) -> Result<(KemPayload, sealbox_crypto::KyberKeyPair)> {
        let id = self.researcher_id()?;
        let pair = self.keystore.require(id)?;
        let meta = self.file_metadata(file_id).await?;
        let owner_wrap = meta
            .owner_wrap
            .as_deref()
            .ok_or(ClientError::NotOwner(file_id))?;
        Ok((KemPayload::from_base64(owner_wrap)?, pair))
    }

    /// Share a file with a single recipient
    ///
    /// Unwraps the owner payload, fetches the recipient's key from the
    /// registry, and submits a fresh recipient wrap. A recipient with
    /// no registered key fails the share with `NoRecipientKey`.
    pub async fn share_with(
        &self,
        file_id: u64,
        recipient_id: &str,
        permission: Permission,
    ) -> Result<ShareCreated> {
        let (owner_wrap, pair) = self.owner_dek_payload(file_id).await?;

        let recipient_key = match self.lookup_public_key(recipient_id).await {
            Ok(key) => key,
            Err(ClientError::Api { status: 404, .. }) => {
                return Err(ClientError::NoRecipientKey(recipient_id.to_string()));
            }
            Err(e) => return Err(e),
        };

        let payload = rewrap(&owner_wrap, pair.secret_key(), &recipient_key)?;
        self.post_json(
            "/api/shares",
            &CreateShareRequest {
                file_id,
                recipient_id: recipient_id.to_string(),
                payload: payload.to_base64(),
                permission,
            },
        )
        .await
    }

    /// Fan a file out to every keyed member of a group
    ///
    /// Builds the full member mapping from the group key listing. Any
    /// member without a registered key fails the whole share before a
    /// single wrap is submitted.
    pub async fn share_with_group(
        &self,
        file_id: u64,
        group_id: u64,
        permission: Permission,
    ) -> Result<ShareCreated> {
        let (owner_wrap, pair) = self.owner_dek_payload(file_id).await?;
        let members = self.group_member_keys(group_id).await?;

        let mut payloads = HashMap::with_capacity(members.len());
        for member in &members {
            let key_b64 = member
                .public_key
                .as_deref()
                .ok_or_else(|| ClientError::NoRecipientKey(member.researcher_id.clone()))?;
            let key = KyberPublicKey::from_base64(key_b64)?;
            let payload = rewrap(&owner_wrap, pair.secret_key(), &key)?;
            payloads.insert(member.researcher_id.clone(), payload.to_base64());
        }

        self.post_json(
            &format!("/api/groups/{}/shares", group_id),
            &CreateGroupShareRequest {
                file_id,
                payloads,
                permission,
            },
        )
        .await
    }

    /// Fetch a share's wrapped payload and metadata by code, without
    /// downloading or decrypting
    pub async fn fetch_share(&self, code: &str) -> Result<FetchedShare> {
        self.get_json(&format!("/api/shares/code/{}", code)).await
    }

    /// Fetch, download, verify, and decrypt a share addressed to the
    /// caller
    pub async fn receive_by_code(
        &self,
        code: &str,
        progress: Option<Progress<'_>>,
    ) -> Result<ReceivedFile> {
        let id = self.researcher_id()?;
        let pair = self.keystore.require(id)?;

        let fetched = self.fetch_share(code).await?;
        let payload = KemPayload::from_base64(&fetched.payload)?;

        report(progress, Phase::Download);
        let blob = self.download_blob(fetched.file_id).await?;
        let meta = self.file_metadata(fetched.file_id).await?;
        let fingerprint = Fingerprint::from_hex(&meta.sha256_hash)?;

        report(progress, Phase::Decrypt);
        let plaintext =
            decrypt_and_unwrap(&payload, pair.secret_key(), &blob, Some(&fingerprint))?;

        report(progress, Phase::Done);
        Ok(ReceivedFile {
            file_id: fetched.file_id,
            file_name: fetched.file_name,
            content_type: fetched.content_type,
            permission: fetched.permission,
            sender: fetched.sender,
            plaintext,
        })
    }

    /// Shares the caller created
    pub async fn outgoing_shares(&self) -> Result<Vec<OutgoingShare>> {
        let body: OutgoingResponse = self.get_json("/api/shares/outgoing").await?;
        Ok(body.shares)
    }

    /// Active shares addressed to the caller
    pub async fn incoming_shares(&self) -> Result<Vec<IncomingShare>> {
        let body: IncomingResponse = self.get_json("/api/shares/incoming").await?;
        Ok(body.shares)
    }

    /// Revoke a share the caller created
    pub async fn revoke_share(&self, share_id: u64) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/api/shares/{}", share_id)))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // ---- Groups -------------------------------------------------------

    /// Create a group owned by the caller
    pub async fn create_group(&self, name: &str) -> Result<GroupInfo> {
        self.post_json(
            "/api/groups",
            &CreateGroupRequest {
                name: name.to_string(),
            },
        )
        .await
    }

    /// Groups the caller belongs to
    pub async fn my_groups(&self) -> Result<Vec<GroupInfo>> {
        let body: GroupListResponse = self.get_json("/api/groups").await?;
        Ok(body.groups)
    }

    /// Add a member to a group
    pub async fn add_group_member(
        &self,
        group_id: u64,
        researcher_id: &str,
        role: GroupRole,
    ) -> Result<GroupInfo> {
        self.post_json(
            &format!("/api/groups/{}/members", group_id),
            &AddMemberRequest {
                researcher_id: researcher_id.to_string(),
                role,
            },
        )
        .await
    }

    /// Remove a member from a group
    pub async fn remove_group_member(
        &self,
        group_id: u64,
        researcher_id: &str,
    ) -> Result<GroupInfo> {
        let response = self
            .http
            .delete(self.url(&format!("/api/groups/{}/members/{}", group_id, researcher_id)))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Current members of a group with their registered public keys
    pub async fn group_member_keys(&self, group_id: u64) -> Result<Vec<MemberKey>> {
        let body: MemberKeysResponse = self
            .get_json(&format!("/api/groups/{}/keys", group_id))
            .await?;
        Ok(body.members)
    }

    /// Shares fanned out to a group
    pub async fn group_shares(&self, group_id: u64) -> Result<Vec<OutgoingShare>> {
        let body: GroupSharesResponse = self
            .get_json(&format!("/api/groups/{}/shares", group_id))
            .await?;
        Ok(body.shares)
    }
}
