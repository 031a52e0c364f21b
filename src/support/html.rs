use axum::response::Html;

use crate::session::Message;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps `body` in the shared page layout, rendering any flash messages first.
pub fn page(title: &str, username: Option<&str>, messages: &[Message], body: &str) -> Html<String> {
    let mut res = String::new();

    res.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">");
    res.push_str(&format!("<title>{}</title></head>\n<body>\n", escape(title)));

    res.push_str("<nav>");
    match username {
        None => res.push_str("<a href=\"/accounts/login/\">Log in</a>"),
        Some(v) => res.push_str(&format!(
            "Welcome back, {}. <form action=\"/accounts/logout/\" method=\"post\"><button type=\"submit\">Log out</button></form>",
            escape(v)
        )),
    }
    res.push_str("</nav>\n");

    if !messages.is_empty() {
        res.push_str("<ul class=\"messages\">\n");
        for message in messages {
            res.push_str(&format!(
                "<li class=\"{}\">{}</li>\n",
                message.level.as_str(), escape(&message.text)
            ));
        }
        res.push_str("</ul>\n");
    }

    res.push_str(body);
    res.push_str("\n</body>\n</html>\n");

    Html(res)
}
