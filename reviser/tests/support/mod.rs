use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reviser::revision::{ModelReply, ModelRequest, RevisionError, RevisionModel};

type Responder = Box<dyn Fn(&ModelRequest) -> Result<ModelReply, RevisionError> + Send + Sync>;

/// In-process stand-in for the AI revision endpoint.
///
/// Records every request it receives so tests can inspect what each
/// attempt was shown.
pub struct MockModel {
    responder: Responder,
    seen: Mutex<Vec<ModelRequest>>,
}

#[allow(dead_code)]
impl MockModel {
    /// Answer from `respond`, which sees the excerpts of each attempt.
    pub fn responding<F>(respond: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<ModelReply, RevisionError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order, then with empty replies.
    pub fn scripted(replies: Vec<Result<ModelReply, RevisionError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::responding(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelReply::Empty))
        })
    }

    pub fn seen(&self) -> Vec<ModelRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl RevisionModel for MockModel {
    async fn propose(&self, request: &ModelRequest) -> Result<ModelReply, RevisionError> {
        self.seen.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

#[allow(dead_code)]
pub fn patches(patches: Vec<shared_types::Patch>) -> ModelReply {
    ModelReply::Patches {
        patches,
        malformed: Vec::new(),
    }
}

/// Ten `##` sections behind a title block, long enough to need excerpting.
/// The Governing Law clause sits at the very end of the document.
#[allow(dead_code)]
pub fn long_contract() -> String {
    let filler = "Lorem ipsum dolor sit amet consectetur. ".repeat(20);
    let mut doc = String::from("MASTER SERVICES AGREEMENT\n");
    doc.push_str("Entered into by Acme Corp and Globex LLC ");
    doc.push_str("on the date of last signature below.\n\n");
    for title in [
        "Definitions",
        "Term",
        "Payment",
        "Confidentiality",
        "Intellectual Property",
        "Warranties",
        "Indemnification",
        "Limitation of Liability",
        "Termination",
    ] {
        doc.push_str(&format!("## {title}\n{filler}\n"));
    }
    doc.push_str(&format!(
        "## Governing Law\n{filler}\nThis agreement is governed by the laws of Delaware.\n"
    ));
    doc
}
