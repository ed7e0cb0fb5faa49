//! Browser chat page served at `/`.
//!
//! The page opens a WebSocket to `/ws`, sends `{date, name, text}` objects and
//! appends every record of each received array to the log.

use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Longest nickname the page accepts.
const NAME_MAX_LEN: usize = 35;

pub fn chat_page(max_message_bytes: Option<usize>) -> Markup {
    let limit = match max_message_bytes {
        Some(n) => n.to_string(),
        None => "null".to_string(),
    };

    html! {
        (DOCTYPE)
        html {
            head {
                title { "Public Chat" }
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                style { (PreEscaped(CSS)) }
            }
            body {
                div class="topnav" {
                    h2 { "Public Chat" }
                }
                textarea id="globalChat" rows="20" readonly {}
                textarea id="sendToChat" rows="2" {}
                div class="controls" {
                    input type="text" id="name" placeholder="nick name" maxlength=(NAME_MAX_LEN);
                    a class="button" id="send" { "Send" }
                }
                script {
                    (PreEscaped(format!(
                        "const MAX_MESSAGE_BYTES = {limit};"
                    )))
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

const CSS: &str = r#"
    html {
        font-family: Arial, Helvetica, sans-serif;
        text-align: center;
        background-color: #e2e9ec;
    }

    body {
        margin: 0;
    }

    .topnav {
        overflow: hidden;
        background-color: #143642;
    }

    h2 {
        font-size: 1.8rem;
        color: white;
    }

    textarea, input {
        background-color: #e2e9ec;
    }

    textarea {
        width: calc(100% - 20px);
        margin: 10px;
    }

    .controls {
        display: flex;
        justify-content: center;
        gap: 10px;
        margin: 20px 0;
    }

    a.button {
        display: inline-block;
        padding: 0.1em 1em;
        border: 0.1em solid #143642;
        border-radius: 0.12em;
        text-decoration: none;
        color: #143642;
        cursor: pointer;
        transition: all 0.2s;
    }

    a.button:hover {
        color: #ffffff;
        background-color: #143642;
    }
"#;

const JAVASCRIPT: &str = r#"
    const chatLog = document.getElementById('globalChat');
    const outgoing = document.getElementById('sendToChat');
    const nameInput = document.getElementById('name');

    function timestamp() {
        const d = new Date();
        return d.getDate() + '/' + (d.getMonth() + 1) + '/' + d.getFullYear() + ' '
            + d.getHours() + ':' + d.getMinutes() + ':' + d.getSeconds();
    }

    function appendLine(date, name, text) {
        chatLog.value += date + ' (' + name + '):' + text + '\n';
        chatLog.scrollTop = chatLog.scrollHeight;
    }

    const encoder = new TextEncoder();

    let host = window.location.host;
    if (host === '') {
        host = '127.0.0.1';
    }
    const socket = new WebSocket('ws://' + host + '/ws');

    socket.addEventListener('message', (event) => {
        try {
            const records = JSON.parse(event.data);
            for (const record of records) {
                appendLine(record.date, record.name, record.text);
            }
        } catch (e) {
            console.log('incoming message could not be parsed.');
            appendLine('!!', 'Server', event.data);
        }
    });

    function sendMessage() {
        const strip = (s) => s.replace(/(\r\n|\n|\r)/gm, '');
        const payload = {
            date: timestamp(),
            name: strip(nameInput.value),
            text: strip(outgoing.value),
        };
        const frame = JSON.stringify(payload);
        // The server counts UTF-8 bytes of the whole frame, not characters
        const size = encoder.encode(frame).length;
        if (MAX_MESSAGE_BYTES !== null && size > MAX_MESSAGE_BYTES) {
            appendLine('!!', 'Page', 'message is ' + size + ' bytes, limit is ' + MAX_MESSAGE_BYTES);
            return;
        }
        outgoing.value = '';
        socket.send(frame);
    }

    document.getElementById('send').addEventListener('click', sendMessage);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_connects_to_ws_endpoint() {
        let page = chat_page(None).into_string();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("/ws"));
        assert!(page.contains("const MAX_MESSAGE_BYTES = null;"));
    }

    #[test]
    fn page_embeds_message_limit() {
        let page = chat_page(Some(512)).into_string();
        assert!(page.contains("const MAX_MESSAGE_BYTES = 512;"));
        assert!(page.contains("maxlength=\"35\""));
    }

    #[test]
    fn page_measures_frames_in_utf8_bytes() {
        let page = chat_page(Some(64)).into_string();
        assert!(page.contains("encoder.encode(frame).length"));
        assert!(page.contains("size > MAX_MESSAGE_BYTES"));
        assert!(!page.contains("maxLength ="));
    }
}
