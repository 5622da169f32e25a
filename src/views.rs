//! Server-rendered pages. Every user-supplied value goes through [`escape`].

use crate::users::repo_types::User;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

fn layout(title: &str, is_authenticated: bool, body: &str) -> String {
    let nav = if is_authenticated {
        r#"<a href="/profile">Perfil</a> <a href="/list">Lista</a> <a href="/logout">Sair</a>"#
    } else {
        r#"<a href="/">Entrar</a> <a href="/register">Cadastrar</a> <a href="/list">Lista</a>"#
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="utf-8"><title>{title} | Oleo-Descarte</title></head>
<body>
<nav>{nav}</nav>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

fn notice(class: &str, text: &str) -> String {
    format!(r#"<p class="{class}">{}</p>"#, escape(text))
}

pub fn login_page(registered: bool, login_failed: bool) -> String {
    let mut body = String::from("<h1>Entrar</h1>\n");
    if registered {
        body.push_str(&notice("success", "Cadastro realizado. Faça login para continuar."));
    }
    if login_failed {
        body.push_str(&notice("error", "E-mail ou senha inválidos."));
    }
    body.push_str(
        r#"
<form method="post" action="/login">
  <label>E-mail <input type="email" name="username" required></label>
  <label>Senha <input type="password" name="password" required></label>
  <button type="submit">Entrar</button>
</form>"#,
    );
    layout("Entrar", false, &body)
}

pub fn register_page(error: Option<&str>) -> String {
    let mut body = String::from("<h1>Cadastro</h1>\n");
    match error {
        Some("duplicate") => body.push_str(&notice("error", "Este e-mail já está cadastrado.")),
        Some("invalid") => body.push_str(&notice("error", "Preencha todos os campos corretamente.")),
        Some(_) => body.push_str(&notice("error", "Não foi possível concluir o cadastro.")),
        None => {}
    }
    body.push_str(
        r#"
<form method="post" action="/create-user">
  <label>Nome <input name="name" required></label>
  <label>Cidade <input name="city" required></label>
  <label>Bairro <input name="district" required></label>
  <label>Quantidade de óleo (L) <input type="number" step="any" min="0" name="oil_quantity" required></label>
  <label>E-mail <input type="email" name="email" required></label>
  <label>Senha <input type="password" name="hashed_password" required></label>
  <button type="submit">Cadastrar</button>
</form>"#,
    );
    layout("Cadastro", false, &body)
}

pub fn profile_page(user: &User, error: Option<&str>) -> String {
    let mut body = format!("<h1>Olá, {}</h1>\n", escape(&user.name));
    if error == Some("duplicate") {
        body.push_str(&notice("error", "Este e-mail já está em uso."));
    }
    body.push_str(&format!(
        r#"
<form method="post" action="/update-user">
  <label>Nome <input name="name" value="{name}"></label>
  <label>E-mail <input type="email" name="email" value="{email}"></label>
  <label>Cidade <input name="city" value="{city}"></label>
  <label>Bairro <input name="district" value="{district}"></label>
  <label>Quantidade de óleo (L) <input type="number" step="any" min="0" name="oil_quantity" value="{qty}"></label>
  <button type="submit" name="action" value="update">Salvar</button>
  <button type="submit" name="action" value="delete">Excluir conta</button>
</form>"#,
        name = escape(&user.name),
        email = escape(&user.email),
        city = escape(&user.city),
        district = escape(&user.district),
        qty = user.oil_quantity,
    ));
    layout("Perfil", true, &body)
}

pub fn list_page(users: &[User], is_authenticated: bool) -> String {
    let mut body = String::from("<h1>Doadores de óleo</h1>\n");
    if users.is_empty() {
        body.push_str(&notice("empty", "Nenhum doador no momento."));
        return layout("Lista", is_authenticated, &body);
    }
    body.push_str(
        "<table>\n<tr><th>Nome</th><th>Cidade</th><th>Bairro</th><th>Óleo (L)</th><th>Contato</th></tr>\n",
    );
    for u in users {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&u.name),
            escape(&u.city),
            escape(&u.district),
            u.oil_quantity,
            escape(&u.email),
        ));
    }
    body.push_str("</table>");
    layout("Lista", is_authenticated, &body)
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user(name: &str) -> User {
        User {
            id: 1,
            name: name.into(),
            city: "Recife".into(),
            district: "Centro".into(),
            oil_quantity: 2.5,
            email: "a@x.com".into(),
            hashed_password: "$argon2id$v=19$secret-digest".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn profile_never_renders_password_hash() {
        let html = profile_page(&user("Ana"), None);
        assert!(html.contains("a@x.com"));
        assert!(!html.contains("argon2"));
    }

    #[test]
    fn list_escapes_user_fields() {
        let html = list_page(&[user("<b>Ana</b>")], false);
        assert!(html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(!html.contains("<b>Ana</b>"));
    }

    #[test]
    fn login_page_shows_flags() {
        assert!(login_page(true, false).contains("Cadastro realizado"));
        assert!(login_page(false, true).contains("inválidos"));
    }
}
