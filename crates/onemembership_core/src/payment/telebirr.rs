//! Telebirr H5 web payment.
//!
//! A request travels as `{appid, sign, ussd}`:
//! - `ussd` is the JSON payload, RSA PKCS#1 v1.5 encrypted in 117-char
//!   chunks with the gateway public key, then base64url encoded;
//! - `sign` is base64url(sha256) of the sorted `key=value` string, which also
//!   carries the merchant app key.

use super::{PaymentError, PaymentResult, PaymentTransport};
use crate::config::TelebirrAccount;
use crate::logging::TRANSACTION_LOG;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use log::debug;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Minutes the gateway keeps an order open.
pub const TIMEOUT_EXPRESS: i64 = 60;
/// Plaintext chunk size that fits a 1024-bit PKCS#1 v1.5 block.
pub const ENCRYPT_CHUNK_CHARS: usize = 117;
pub const WEB_PAY_PATH: &str = "toTradeWebPay";

/// Mints a gateway nonce: a v4 uuid without hyphens.
pub fn mint_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn out_trade_no(nonce: &str) -> String {
    format!("T_{nonce}")
}

/// Order details that vary per payment.
#[derive(Debug, Clone, PartialEq)]
pub struct WebPayOrder<'a> {
    pub nonce: &'a str,
    pub receiver_name: &'a str,
    pub subject: &'a str,
    /// Received amount plus gateway fee.
    pub total_amount: f64,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Payload encrypted into `ussd`. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPayRequest {
    pub app_id: String,
    #[serde(skip)]
    pub app_key: String,
    pub nonce: String,
    pub notify_url: String,
    pub out_trade_no: String,
    #[serde(rename = "receiveName")]
    pub receiver_name: String,
    pub return_url: String,
    pub short_code: String,
    pub subject: String,
    pub timeout_express: String,
    pub timestamp: String,
    pub total_amount: String,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    appid: &'a str,
    sign: &'a str,
    ussd: &'a str,
}

#[derive(Debug, Deserialize)]
struct WebPayResponse {
    code: serde_json::Value,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<HashMap<String, serde_json::Value>>,
}

/// Parses a gateway public key in SPKI or PKCS#1 PEM form.
pub fn parse_public_key(pem: &str) -> PaymentResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem.trim())
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem.trim()))
        .map_err(|err| PaymentError::Key(err.to_string()))
}

/// Encrypts `payload` chunk by chunk and base64url encodes the concatenation.
///
/// Chunks are counted in characters, not bytes. A chunk of multi-byte text
/// can exceed the key's PKCS#1 v1.5 block and fails with
/// [`PaymentError::Encrypt`]; a 1024-bit key holds 117 bytes per block.
pub fn encrypt_payload(payload: &str, key: &RsaPublicKey) -> PaymentResult<String> {
    let chars: Vec<char> = payload.chars().collect();
    let mut rng = rand::thread_rng();
    let mut encrypted = Vec::new();
    for chunk in chars.chunks(ENCRYPT_CHUNK_CHARS) {
        let chunk: String = chunk.iter().collect();
        let block = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk.as_bytes())
            .map_err(|err| PaymentError::Encrypt(err.to_string()))?;
        encrypted.extend_from_slice(&block);
    }
    Ok(URL_SAFE.encode(encrypted))
}

/// Builds the `k=v&k=v` string that gets signed.
///
/// Keys are sorted; empty optional fields are left out.
pub fn string_to_sign(request: &WebPayRequest) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("appId", request.app_id.as_str());
    fields.insert("appKey", request.app_key.as_str());
    fields.insert("nonce", request.nonce.as_str());
    fields.insert("outTradeNo", request.out_trade_no.as_str());
    fields.insert("shortCode", request.short_code.as_str());
    fields.insert("timeoutExpress", request.timeout_express.as_str());
    fields.insert("timestamp", request.timestamp.as_str());
    fields.insert("totalAmount", request.total_amount.as_str());
    for (key, value) in [
        ("notifyUrl", request.notify_url.as_str()),
        ("receiveName", request.receiver_name.as_str()),
        ("returnUrl", request.return_url.as_str()),
        ("subject", request.subject.as_str()),
    ] {
        if !value.is_empty() {
            fields.insert(key, value);
        }
    }
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_payload(request: &WebPayRequest) -> String {
    let digest = Sha256::digest(string_to_sign(request).as_bytes());
    URL_SAFE.encode(digest)
}

/// Telebirr client bound to one merchant account.
pub struct TelebirrClient<T> {
    account: TelebirrAccount,
    public_key: RsaPublicKey,
    transport: T,
}

impl<T: PaymentTransport> TelebirrClient<T> {
    pub fn new(
        account: TelebirrAccount,
        public_key_pem: &str,
        transport: T,
    ) -> PaymentResult<Self> {
        if account.api_access_point.trim().is_empty() {
            return Err(PaymentError::Config("api_access_point is empty".to_string()));
        }
        if account.app_id.trim().is_empty() || account.app_key.trim().is_empty() {
            return Err(PaymentError::Config("app_id and app_key are required".to_string()));
        }
        let public_key = parse_public_key(public_key_pem)?;
        Ok(Self {
            account,
            public_key,
            transport,
        })
    }

    pub fn account(&self) -> &TelebirrAccount {
        &self.account
    }

    pub fn transaction_fee(&self) -> f64 {
        self.account.transaction_fee
    }

    pub fn web_pay_request(&self, order: &WebPayOrder<'_>) -> WebPayRequest {
        WebPayRequest {
            app_id: self.account.app_id.clone(),
            app_key: self.account.app_key.clone(),
            nonce: order.nonce.to_string(),
            notify_url: self.account.notify_url.clone(),
            out_trade_no: out_trade_no(order.nonce),
            receiver_name: order.receiver_name.to_string(),
            return_url: self.account.return_url.clone(),
            short_code: self.account.short_code.clone(),
            subject: order.subject.to_string(),
            timeout_express: TIMEOUT_EXPRESS.to_string(),
            timestamp: order.timestamp.to_string(),
            total_amount: format!("{:.2}", order.total_amount),
        }
    }

    /// Sends `request` to the web pay endpoint and returns the checkout url.
    pub fn request_web_url(&self, request: &WebPayRequest) -> PaymentResult<String> {
        let payload =
            serde_json::to_string(request).map_err(|err| PaymentError::Encode(err.to_string()))?;
        let ussd = encrypt_payload(&payload, &self.public_key)?;
        let sign = sign_payload(request);
        let body = serde_json::to_string(&Envelope {
            appid: &request.app_id,
            sign: &sign,
            ussd: &ussd,
        })
        .map_err(|err| PaymentError::Encode(err.to_string()))?;

        let url = format!("{}{}", self.account.api_access_point, WEB_PAY_PATH);
        debug!(
            target: TRANSACTION_LOG,
            "event=telebirr_web_pay module=payment status=start out_trade_no={} url={}",
            request.out_trade_no,
            url
        );
        let raw = self.transport.post_json(&url, &body)?;
        parse_web_pay_response(&raw)
    }
}

fn parse_web_pay_response(raw: &str) -> PaymentResult<String> {
    let response: WebPayResponse =
        serde_json::from_str(raw).map_err(|err| PaymentError::Decode(err.to_string()))?;
    let code = match &response.code {
        serde_json::Value::String(code) => code.clone(),
        other => other.to_string(),
    };
    if code != "0" {
        return Err(PaymentError::Rejected {
            code,
            message: response.msg,
        });
    }
    response
        .data
        .as_ref()
        .and_then(|data| data.get("toPayUrl"))
        .and_then(|url| url.as_str())
        .map(str::to_string)
        .ok_or_else(|| PaymentError::Decode("response has no toPayUrl".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::cell::RefCell;

    struct RecordingTransport {
        response: String,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl PaymentTransport for RecordingTransport {
        fn post_json(&self, url: &str, body: &str) -> PaymentResult<String> {
            self.calls
                .borrow_mut()
                .push((url.to_string(), body.to_string()));
            Ok(self.response.clone())
        }
    }

    fn account() -> TelebirrAccount {
        TelebirrAccount {
            api_access_point: "https://pay.example.test/service-openup/".to_string(),
            app_id: "app-1".to_string(),
            app_key: "secret".to_string(),
            notify_url: String::new(),
            return_url: "https://example.test/done".to_string(),
            short_code: "500100".to_string(),
            transaction_fee: 2.0,
        }
    }

    fn keypair() -> (RsaPrivateKey, String) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, pem)
    }

    fn request(client: &TelebirrClient<RecordingTransport>) -> WebPayRequest {
        client.web_pay_request(&WebPayOrder {
            nonce: "abc123",
            receiver_name: "",
            subject: "Gold",
            total_amount: 12.5,
            timestamp: 1_700_000_000,
        })
    }

    fn client(response: &str, pem: &str) -> TelebirrClient<RecordingTransport> {
        let transport = RecordingTransport {
            response: response.to_string(),
            calls: RefCell::new(Vec::new()),
        };
        TelebirrClient::new(account(), pem, transport).unwrap()
    }

    #[test]
    fn payload_keeps_wire_key_order_and_omits_app_key() {
        let (_, pem) = keypair();
        let client = client("{}", &pem);
        let json = serde_json::to_string(&request(&client)).unwrap();

        let keys = [
            "appId",
            "nonce",
            "notifyUrl",
            "outTradeNo",
            "receiveName",
            "returnUrl",
            "shortCode",
            "subject",
            "timeoutExpress",
            "timestamp",
            "totalAmount",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|key| json.find(&format!("\"{key}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!json.contains("appKey"));
        assert!(json.contains("\"totalAmount\":\"12.50\""));
        assert!(json.contains("\"outTradeNo\":\"T_abc123\""));
    }

    #[test]
    fn string_to_sign_is_sorted_and_skips_empty_optionals() {
        let (_, pem) = keypair();
        let client = client("{}", &pem);
        assert_eq!(
            string_to_sign(&request(&client)),
            "appId=app-1&appKey=secret&nonce=abc123&outTradeNo=T_abc123\
             &returnUrl=https://example.test/done&shortCode=500100&subject=Gold\
             &timeoutExpress=60&timestamp=1700000000&totalAmount=12.50"
        );
    }

    #[test]
    fn encrypted_chunks_decrypt_back_to_payload() {
        let (private, pem) = keypair();
        let key = parse_public_key(&pem).unwrap();
        let payload = "x".repeat(300);

        let encoded = encrypt_payload(&payload, &key).unwrap();
        let bytes = URL_SAFE.decode(encoded).unwrap();
        assert_eq!(bytes.len(), 3 * 128);

        let decrypted: Vec<u8> = bytes
            .chunks(128)
            .flat_map(|block| private.decrypt(Pkcs1v15Encrypt, block).unwrap())
            .collect();
        assert_eq!(String::from_utf8(decrypted).unwrap(), payload);
    }

    #[test]
    fn multi_byte_chunk_overflows_a_1024_bit_block() {
        let (_, pem) = keypair();
        let key = parse_public_key(&pem).unwrap();

        assert!(encrypt_payload(&"ሀ".repeat(39), &key).is_ok());
        assert!(matches!(
            encrypt_payload(&"ሀ".repeat(40), &key),
            Err(PaymentError::Encrypt(_))
        ));
    }

    #[test]
    fn successful_response_returns_checkout_url() {
        let (_, pem) = keypair();
        let client = client(
            r#"{"code":"0","msg":"success","data":{"toPayUrl":"https://pay.example.test/h5/1"}}"#,
            &pem,
        );
        let url = client.request_web_url(&request(&client)).unwrap();
        assert_eq!(url, "https://pay.example.test/h5/1");

        let calls = client.transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://pay.example.test/service-openup/toTradeWebPay");
        let body: serde_json::Value = serde_json::from_str(&calls[0].1).unwrap();
        assert_eq!(body["appid"], "app-1");
        assert_eq!(body["sign"], sign_payload(&request(&client)).as_str());
        assert!(body["ussd"].as_str().is_some_and(|ussd| !ussd.is_empty()));
    }

    #[test]
    fn non_zero_code_is_rejected() {
        let (_, pem) = keypair();
        let client = client(r#"{"code":"1001","msg":"bad sign"}"#, &pem);
        let err = client.request_web_url(&request(&client)).unwrap_err();
        assert_eq!(
            err,
            PaymentError::Rejected {
                code: "1001".to_string(),
                message: "bad sign".to_string()
            }
        );
    }

    #[test]
    fn garbage_key_is_key_error() {
        let transport = RecordingTransport {
            response: String::new(),
            calls: RefCell::new(Vec::new()),
        };
        let result = TelebirrClient::new(account(), "not a key", transport);
        assert!(matches!(result, Err(PaymentError::Key(_))));
    }

    #[test]
    fn nonce_is_hyphen_free_uuid() {
        let nonce = mint_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_eq!(out_trade_no(&nonce), format!("T_{nonce}"));
    }
}
