//! Script assembly: prelude + request bindings + caller script.
//!
//! The caller script goes last, passed through [`lowering::lower`] so that
//! `while` loops and set displays reach the parser in a form it accepts.
//!
//! Bindings are rendered from a small fixed grammar ([`Binding`] /
//! [`Expr`]). Request strings only ever reach the source text through
//! [`string_literal`], which uses the interpreter's own `repr` of a string
//! value, so message text, names and colors cannot close a literal early and
//! inject statements.

use starlark::values::Heap;

use crate::lowering;
use crate::request::InvocationRequest;

/// Helpers written in Starlark itself, evaluated before every script.
pub const PRELUDE: &str = r#"p = print
def choice(iterable):
    n = len(iterable)
    if n == 0:
        return None
    i = randint(0, n)
    return iterable[i]
def set(iterable=()):
    s = {}
    for x in iterable:
        s[x] = None
    return s
def sum(iterable):
    s = 0
    for i in iterable:
        s += i
    return s
def post(url, headers=None, data=None, j=None):
    if j != None:
        (resp_code, body, is_json) = post_internal(url, headers=headers, json=json.encode(j))
    else:
        (resp_code, body, is_json) = post_internal(url, headers=headers, data=data)
    if is_json:
        return (resp_code, json.decode(body))
    return (resp_code, body)
def get(url, headers=None):
    if headers == None:
        (resp_code, body, is_json) = get_internal(url)
    else:
        (resp_code, body, is_json) = get_internal(url, headers)
    if is_json:
        return (resp_code, json.decode(body))
    return (resp_code, body)
"#;

/// Right-hand side of a generated assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    Int(i128),
    Str(&'a str),
    /// Reference to a name already in scope (an injected value or an earlier
    /// binding). Only compile-time constants are allowed here.
    Name(&'static str),
    List(Vec<Expr<'a>>),
    /// `struct(field=expr, ...)`
    Struct(Vec<(&'static str, Expr<'a>)>),
}

impl Expr<'_> {
    fn render(&self, heap: &Heap) -> String {
        match self {
            Expr::Int(n) => n.to_string(),
            Expr::Str(s) => string_literal(heap, s),
            Expr::Name(name) => (*name).to_string(),
            Expr::List(items) => {
                let items: Vec<String> = items.iter().map(|item| item.render(heap)).collect();
                format!("[{}]", items.join(", "))
            }
            Expr::Struct(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| format!("{field}={}", value.render(heap)))
                    .collect();
                format!("struct({})", fields.join(", "))
            }
        }
    }
}

/// `name = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<'a> {
    pub name: &'static str,
    pub value: Expr<'a>,
}

impl Binding<'_> {
    pub fn render(&self, heap: &Heap) -> String {
        format!("{} = {}", self.name, self.value.render(heap))
    }
}

/// Quote `s` as a Starlark string literal.
pub fn string_literal(heap: &Heap, s: &str) -> String {
    heap.alloc(s).to_repr()
}

/// The bindings every script sees, in evaluation order.
pub fn bindings(request: &InvocationRequest) -> Vec<Binding<'_>> {
    let author = &request.message_author;
    let roles = author.roles.iter().map(|r| Expr::Int(i128::from(*r))).collect();

    vec![
        Binding {
            name: "author_roles",
            value: Expr::List(roles),
        },
        Binding {
            name: "message",
            value: Expr::Struct(vec![
                ("id", Expr::Int(i128::from(request.trigger_message.id))),
                ("content", Expr::Name("message_content_full")),
                ("clean", Expr::Name("message_clean_full")),
            ]),
        },
        Binding {
            name: "author",
            value: Expr::Struct(vec![
                ("id", Expr::Int(i128::from(author.id))),
                ("avatar_url", Expr::Str(&author.avatar_url)),
                ("color", Expr::Str(&author.color)),
                ("discrim", Expr::Int(i128::from(author.discriminator))),
                ("roles", Expr::Name("author_roles")),
                ("name", Expr::Str(&author.name)),
                ("nick", Expr::Str(&author.nick)),
                ("disp", Expr::Str(&author.display_name)),
                ("perms", Expr::Int(i128::from(author.permissions))),
            ]),
        },
        Binding {
            name: "channel",
            value: Expr::Struct(vec![
                ("id", Expr::Int(i128::from(request.channel.id))),
                ("name", Expr::Name("channel_name")),
            ]),
        },
        Binding {
            name: "count",
            value: Expr::Int(i128::from(request.count)),
        },
        Binding {
            name: "msg",
            value: Expr::Name("message"),
        },
        Binding {
            name: "a",
            value: Expr::Name("author"),
        },
        Binding {
            name: "ch",
            value: Expr::Name("channel"),
        },
    ]
}

/// Render the complete source unit for `request`.
pub fn assemble(request: &InvocationRequest) -> String {
    let heap = Heap::new();
    let mut source = String::with_capacity(PRELUDE.len() + request.script.len() + 512);
    source.push_str(PRELUDE);
    for binding in bindings(request) {
        source.push_str(&binding.render(&heap));
        source.push('\n');
    }
    source.push_str(&lowering::lower(&request.script));
    source
}
