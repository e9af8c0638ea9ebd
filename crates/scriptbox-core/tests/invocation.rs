//! End-to-end script behaviour through `ScriptRunner::run_script`.

use scriptbox_core::{
    Channel, ErrorCode, Identity, InvocationRequest, InvocationResult, ScriptRunner,
    TriggerMessage,
};

fn runner() -> ScriptRunner {
    ScriptRunner::with_defaults().unwrap()
}

async fn run(script: &str) -> InvocationResult {
    runner()
        .run_script(InvocationRequest {
            script: script.to_string(),
            ..Default::default()
        })
        .await
}

fn populated_request(script: &str) -> InvocationRequest {
    InvocationRequest {
        script: script.to_string(),
        trigger_message: TriggerMessage {
            id: 900,
            content: "hello <@214037134477230080>".into(),
            clean: "hello @alice".into(),
        },
        message_author: Identity {
            id: 214037134477230080,
            name: "alice".into(),
            nick: "ally".into(),
            display_name: "Alice".into(),
            avatar_url: "https://cdn.example/a.png".into(),
            color: "#ff00aa".into(),
            discriminator: 1234,
            roles: vec![436189230390050826, 7],
            permissions: 2048,
        },
        script_author: Identity {
            id: 1,
            name: "bob".into(),
            ..Default::default()
        },
        channel: Channel {
            id: 555,
            name: "general".into(),
        },
        guild_id: 436189230390050826,
        count: 7,
        captures: vec!["first".into(), "second".into()],
        arguments: vec!["arg0".into()],
    }
}

// -------------------------------------------------------------------------
// Output and classification
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_prints_joined_with_newlines() {
    let result = run("print('one')\nprint('two')\np('three')").await;
    assert_eq!(result.code, ErrorCode::Success);
    assert_eq!(result.output, "one\ntwo\nthree");
    assert!(result.error.is_empty());
}

#[tokio::test]
async fn test_no_prints_is_empty_success() {
    let result = run("x = 1 + 2").await;
    assert_eq!(result, InvocationResult::success(String::new()));
}

#[tokio::test]
async fn test_error_before_any_print() {
    let result = run("fail('nope')").await;
    assert_eq!(result.code, ErrorCode::RuntimeError);
    assert_eq!(result.code.as_u32(), 4);
    assert!(result.output.is_empty());
    assert!(result.error.contains("nope"));
}

#[tokio::test]
async fn test_partial_output_survives_error() {
    let result = run("print('kept')\nfail('later')").await;
    assert_eq!(result.code, ErrorCode::RuntimeError);
    assert_eq!(result.output, "kept");
    assert!(result.error.contains("later"));
}

#[tokio::test]
async fn test_syntax_error_is_runtime_error() {
    let result = run("print('unterminated)").await;
    assert_eq!(result.code, ErrorCode::RuntimeError);
    assert!(result.output.is_empty());
}

// -------------------------------------------------------------------------
// Capability table
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_randint_unit_range_is_always_low() {
    let script = "for i in range(200):\n    if randint(0, 1) != 0:\n        fail('drew non-zero')\nprint('ok')";
    let result = run(script).await;
    assert_eq!(result.output, "ok", "error: {}", result.error);
}

#[tokio::test]
async fn test_randint_accepts_bounds_past_32_bits() {
    let script = "\
for i in range(50):
    n = randint(0, 3000000000)
    if n < 0 or n >= 3000000000:
        fail('out of range')
print(randint(-5000000000, -4999999999))";
    let result = run(script).await;
    assert_eq!(result.output, "-5000000000", "error: {}", result.error);
}

#[tokio::test]
async fn test_random_is_unit_interval() {
    let script = "for i in range(200):\n    r = random()\n    if r < 0 or r >= 1:\n        fail('out of range')\nprint('ok')";
    let result = run(script).await;
    assert_eq!(result.output, "ok", "error: {}", result.error);
}

#[tokio::test]
async fn test_sin() {
    let result = run("print(sin(0.0))\nprint(sin(1.5707963267948966) > 0.99)").await;
    assert_eq!(result.output, "0.0\nTrue");
}

#[tokio::test]
async fn test_struct_and_json() {
    let result = run("s = struct(a=1, b='x')\nprint(s.b)\nprint(json.decode('[1, 2]')[1])").await;
    assert_eq!(result.output, "x\n2", "error: {}", result.error);
}

#[tokio::test]
async fn test_unlisted_names_are_unreachable() {
    for script in ["open('/etc/passwd')", "print(env)", "exec('1')"] {
        let result = run(script).await;
        assert_eq!(result.code, ErrorCode::RuntimeError, "{script} ran");
    }
}

#[tokio::test]
async fn test_load_is_rejected() {
    let result = run("load('other.star', 'x')").await;
    assert_eq!(result.code, ErrorCode::RuntimeError);
}

#[tokio::test]
async fn test_language_features() {
    let script = r#"
def fact(n):
    return 1 if n <= 1 else n * fact(n - 1)

def outer():
    def inner(x):
        return x * 2
    return inner(21)

double = lambda x: x * 2
total = 0
total = total + 5
print(fact(10))
print(outer())
print(double(4))
print(total)
"#;
    let result = run(script).await;
    assert_eq!(
        result.output, "3628800\n42\n8\n5",
        "error: {}",
        result.error
    );
}

#[tokio::test]
async fn test_while_loops() {
    let script = r#"
i = 0
total = 0
while i < 5:
    i += 1
    if i == 2:
        continue
    total += i
print(total)

def first_power_over(limit):
    n = 1
    while True:
        n *= 2
        if n > limit:
            break
    return n
print(first_power_over(100))

k = 3
while k: k -= 1
print(k)
"#;
    let result = run(script).await;
    assert_eq!(result.output, "13\n128\n0", "error: {}", result.error);
}

#[tokio::test]
async fn test_set_literals() {
    let script = "\
s = {1, 2, 2}
print(len(s))
print(2 in s)
print(3 in s)
print(len({x % 3 for x in range(10)}))
print(set([1, 1]) == {1})
print({'k': 1}['k'])";
    let result = run(script).await;
    assert_eq!(
        result.output, "2\nTrue\nFalse\n3\nTrue\n1",
        "error: {}",
        result.error
    );
}

#[tokio::test]
async fn test_keywords_inside_strings_are_plain_text() {
    let result = run("print('while True: {1, 2}')").await;
    assert_eq!(result.output, "while True: {1, 2}", "error: {}", result.error);
}

// -------------------------------------------------------------------------
// Injected values and prelude
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_injected_values() {
    let script = "\
print(caps[1])
print(args[0])
print(auth_list)
print(channel_name)
print(count)
print(message_content_full)
print(message_clean_full)";
    let result = runner().run_script(populated_request(script)).await;
    assert_eq!(
        result.output,
        "second\narg0\n[\"alice\", \"ally\", \"Alice\"]\ngeneral\n7\nhello <@214037134477230080>\nhello @alice",
        "error: {}",
        result.error
    );
}

#[tokio::test]
async fn test_generated_structs_and_aliases() {
    let script = "\
print(message.id)
print(msg.content == message.content)
print(msg.clean)
print(author.name)
print(a.nick)
print(a.disp)
print(a.avatar_url)
print(a.color)
print(a.discrim)
print(a.roles[0])
print(len(author_roles))
print(a.perms)
print(a.id)
print(ch.id)
print(channel.name)";
    let result = runner().run_script(populated_request(script)).await;
    let expected = [
        "900",
        "True",
        "hello @alice",
        "alice",
        "ally",
        "Alice",
        "https://cdn.example/a.png",
        "#ff00aa",
        "1234",
        "436189230390050826",
        "2",
        "2048",
        "214037134477230080",
        "555",
        "general",
    ]
    .join("\n");
    assert_eq!(result.output, expected, "error: {}", result.error);
}

#[tokio::test]
async fn test_prelude_helpers() {
    let script = "\
print(sum([1, 2, 3, 4]))
print(sum([]))
print(choice(['only']))
print(choice([]))";
    let result = run(script).await;
    assert_eq!(result.output, "10\n0\nonly\nNone", "error: {}", result.error);
}

#[tokio::test]
async fn test_concurrent_invocations_are_isolated() {
    let runner = runner();
    let mut handles = Vec::new();
    for i in 0..8 {
        let runner = runner.clone();
        handles.push(tokio::spawn(async move {
            let mut request = populated_request("print(count)");
            request.count = i;
            runner.run_script(request).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert_eq!(result.output, i.to_string());
    }
}

#[tokio::test]
async fn test_every_capability_name_resolves() {
    use scriptbox_core::capability::{GLOBAL_FUNCTIONS, INJECTED_VALUES};

    let runner = runner();
    for name in GLOBAL_FUNCTIONS.iter().chain(INJECTED_VALUES) {
        let result = runner
            .run_script(populated_request(&format!("x = {name}")))
            .await;
        assert_eq!(result.code, ErrorCode::Success, "{name}: {}", result.error);
    }
}
