/// HTTP asset source built on `window.fetch`
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use js_sys::{Reflect, Uint8Array};
use scroll3d_core::{AssetRef, AssetSource, LoadError, ProgressSink};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, ReadableStreamDefaultReader, RequestInit, Response};

fn network(e: JsValue) -> LoadError {
    LoadError::Network(format!("{:?}", e))
}

/// Aborts the browser request when the load future is dropped
struct AbortOnDrop(AbortController);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fetches assets with a single GET relative to the page
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAssetSource;

impl AssetSource for HttpAssetSource {
    fn fetch(
        &self,
        asset: &AssetRef,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let url = asset.as_str().to_string();
        async move { fetch_bytes(&url, &progress).await }.boxed_local()
    }
}

async fn fetch_bytes(url: &str, progress: &ProgressSink) -> Result<Vec<u8>, LoadError> {
    let window = web_sys::window().ok_or_else(|| LoadError::Network("no window".into()))?;
    let abort = AbortOnDrop(AbortController::new().map_err(network)?);
    let init = RequestInit::new();
    init.set_signal(Some(&abort.0.signal()));

    let resp_val = JsFuture::from(window.fetch_with_str_and_init(url, &init))
        .await
        .map_err(network)?;
    let resp: Response = resp_val.dyn_into().map_err(network)?;
    if !resp.ok() {
        return Err(LoadError::Network(format!(
            "HTTP {} {}",
            resp.status(),
            resp.status_text()
        )));
    }

    let total = resp
        .headers()
        .get("content-length")
        .ok()
        .flatten()
        .and_then(|len| len.parse::<u64>().ok());

    let Some(body) = resp.body() else {
        let buf_promise = resp.array_buffer().map_err(network)?;
        let buf_val = JsFuture::from(buf_promise).await.map_err(network)?;
        let bytes = Uint8Array::new(&buf_val);
        let mut out = vec![0u8; bytes.length() as usize];
        bytes.copy_to(&mut out);
        return Ok(out);
    };

    let reader: ReadableStreamDefaultReader = body
        .get_reader()
        .dyn_into()
        .map_err(|e| network(e.into()))?;
    let mut out = Vec::with_capacity(total.unwrap_or(0) as usize);
    loop {
        let chunk = JsFuture::from(reader.read()).await.map_err(network)?;
        let done = Reflect::get(&chunk, &JsValue::from_str("done"))
            .map_err(network)?
            .as_bool()
            .unwrap_or(true);
        if done {
            break;
        }
        let value = Reflect::get(&chunk, &JsValue::from_str("value")).map_err(network)?;
        let bytes = Uint8Array::new(&value);
        let start = out.len();
        out.resize(start + bytes.length() as usize, 0);
        bytes.copy_to(&mut out[start..]);
        progress.report_bytes(out.len() as u64, total);
    }
    Ok(out)
}
