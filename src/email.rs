//! Product email rendering.

use std::fmt::Write;

use crate::core::{Item, UserProfile};
use crate::services::OutgoingEmail;

/// Renders the "product information" email for `item` addressed to `user`.
#[must_use]
pub fn render_product_email(user: &UserProfile, item: &Item) -> OutgoingEmail {
    OutgoingEmail {
        to: user.email.clone(),
        subject: format!("Product Information: {}", item.name),
        html_body: render_html(user.greeting_name(), item),
        text_body: render_text(user.greeting_name(), item),
    }
}

fn render_text(name: &str, item: &Item) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Hello {name},\n");
    let _ = writeln!(out, "Here's the product information you requested:\n");
    let _ = writeln!(out, "Product: {}", item.name);
    let _ = writeln!(out, "Category: {}", item.category);
    let _ = writeln!(out, "Regular Price: ${:.2} CAD", item.regular_price);
    let _ = writeln!(out, "Sale Price: ${:.2} CAD", item.sale_price);
    if let Some(savings) = item.savings() {
        let _ = writeln!(out, "You save: ${savings:.2} CAD (On Sale!)");
    }
    let _ = writeln!(out, "\nDescription: {}", item.description);
    let _ = writeln!(out, "\nView it online: {}", item.url);
    let _ = writeln!(
        out,
        "\nIf you have any questions or would like to make a purchase, just reply in the chat."
    );
    out
}

fn render_html(name: &str, item: &Item) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<body style=\"font-family: Arial, sans-serif; color: #333;\">\n");
    let _ = writeln!(out, "<h1>Product Information</h1>");
    let _ = writeln!(out, "<p>Hello {},</p>", escape_html(name));
    out.push_str("<p>Here's the product information you requested:</p>\n");
    if let Some(image) = &item.image {
        let _ = writeln!(
            out,
            "<img src=\"{}\" alt=\"{}\" style=\"max-width: 100%;\">",
            escape_html(image),
            escape_html(&item.name)
        );
    }
    let _ = writeln!(out, "<h2>{}</h2>", escape_html(&item.name));
    let _ = writeln!(
        out,
        "<p><strong>Category:</strong> {}</p>",
        escape_html(&item.category)
    );
    let _ = writeln!(
        out,
        "<p><span style=\"font-weight: bold;\">${:.2}</span> \
         <span style=\"color: #888; text-decoration: line-through;\">${:.2}</span></p>",
        item.sale_price, item.regular_price
    );
    if let Some(savings) = item.savings() {
        let _ = writeln!(
            out,
            "<p style=\"color: #28a745; font-weight: bold;\">Save ${savings:.2} CAD</p>"
        );
    }
    let _ = writeln!(out, "<h3>Description</h3>\n<p>{}</p>", escape_html(&item.description));
    let _ = writeln!(
        out,
        "<p><a href=\"{}\">View product</a></p>",
        escape_html(&item.url)
    );
    out.push_str("</body>\n</html>\n");
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
