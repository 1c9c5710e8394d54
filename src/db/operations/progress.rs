use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKind {
    Registered,
    Anonymous,
}

impl UserKind {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_lowercase()) {
            Some(l) if l == "anonimo" || l == "anónimo" || l == "anonymous" => Self::Anonymous,
            Some(_) => Self::Registered,
            None => Self::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub level_label: Option<String>,
    pub total_score: i64,
    pub simulations_completed: i64,
    pub simulations_total: i64,
    pub theories_completed: i64,
    pub theories_total: i64,
    pub total_minutes: i64,
    pub user_kind: UserKind,
    pub ranking_position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralStatsRow {
    pub total_simulations: i64,
    pub simulations_completed: i64,
    pub simulations_in_progress: i64,
    pub simulations_failed: i64,
    pub distinct_elements_used: i64,
    pub theories_read: i64,
    pub theories_total: i64,
    pub ai_questions_asked: i64,
    pub total_points: i64,
    pub level_label: Option<String>,
    pub total_minutes: i64,
}

/// One use of an element inside one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementUsageRow {
    pub element_id: i64,
    pub element_name: String,
    pub symbol: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRow {
    pub simulation_id: i64,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub duration_minutes: Option<i64>,
    pub simulation_type: Option<String>,
    pub points_earned: i64,
    pub elements_used: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationPage {
    pub total_count: i64,
    pub rows: Vec<SimulationRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TheoryRow {
    pub theory_id: i64,
    pub title: String,
    pub category: Option<String>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub tasks_total: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProgressEvent {
    pub user_id: i64,
    pub action_name: String,
    pub description: String,
    pub points: i64,
    pub payload: serde_json::Value,
    pub session_id: Option<Uuid>,
}

pub async fn select_progress_summary(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<SummaryRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            v.nivel::TEXT AS nivel,
            COALESCE(v.puntos_totales, 0)::BIGINT AS puntos_totales,
            COALESCE(v.simulaciones_completadas, 0)::BIGINT AS simulaciones_completadas,
            COALESCE(v.total_simulaciones, 0)::BIGINT AS total_simulaciones,
            COALESCE(v.teorias_leidas, 0)::BIGINT AS teorias_leidas,
            COALESCE(v.total_teorias_disponibles, 0)::BIGINT AS total_teorias_disponibles,
            COALESCE(v.tiempo_total_simulacion_minutos, 0)::BIGINT AS tiempo_total_minutos,
            u.tipo_usuario::TEXT AS tipo_usuario,
            (
                SELECT COUNT(*) + 1
                FROM vista_estadisticas_completas o
                WHERE COALESCE(o.puntos_totales, 0) > COALESCE(v.puntos_totales, 0)
            )::BIGINT AS posicion_ranking
        FROM vista_estadisticas_completas v
        INNER JOIN usuario u ON u.id_usuario = v.id_usuario
        WHERE v.id_usuario = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        let user_type: Option<String> = r.try_get("tipo_usuario")?;
        Ok::<_, sqlx::Error>(SummaryRow {
            level_label: r.try_get("nivel")?,
            total_score: r.try_get("puntos_totales")?,
            simulations_completed: r.try_get("simulaciones_completadas")?,
            simulations_total: r.try_get("total_simulaciones")?,
            theories_completed: r.try_get("teorias_leidas")?,
            theories_total: r.try_get("total_teorias_disponibles")?,
            total_minutes: r.try_get("tiempo_total_minutos")?,
            user_kind: UserKind::from_label(user_type.as_deref()),
            ranking_position: r.try_get("posicion_ranking")?,
        })
    })
    .transpose()
}

pub async fn select_general_statistics(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<GeneralStatsRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(total_simulaciones, 0)::BIGINT AS total_simulaciones,
            COALESCE(simulaciones_completadas, 0)::BIGINT AS simulaciones_completadas,
            COALESCE(simulaciones_en_proceso, 0)::BIGINT AS simulaciones_en_proceso,
            COALESCE(simulaciones_fallidas, 0)::BIGINT AS simulaciones_fallidas,
            COALESCE(elementos_diferentes_usados, 0)::BIGINT AS elementos_diferentes_usados,
            COALESCE(teorias_leidas, 0)::BIGINT AS teorias_leidas,
            COALESCE(total_teorias_disponibles, 0)::BIGINT AS total_teorias_disponibles,
            COALESCE(preguntas_ia_realizadas, 0)::BIGINT AS preguntas_ia_realizadas,
            COALESCE(puntos_totales, 0)::BIGINT AS puntos_totales,
            nivel::TEXT AS nivel,
            COALESCE(tiempo_total_simulacion_minutos, 0)::BIGINT AS tiempo_total_minutos
        FROM vista_estadisticas_completas
        WHERE id_usuario = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        Ok::<_, sqlx::Error>(GeneralStatsRow {
            total_simulations: r.try_get("total_simulaciones")?,
            simulations_completed: r.try_get("simulaciones_completadas")?,
            simulations_in_progress: r.try_get("simulaciones_en_proceso")?,
            simulations_failed: r.try_get("simulaciones_fallidas")?,
            distinct_elements_used: r.try_get("elementos_diferentes_usados")?,
            theories_read: r.try_get("teorias_leidas")?,
            theories_total: r.try_get("total_teorias_disponibles")?,
            ai_questions_asked: r.try_get("preguntas_ia_realizadas")?,
            total_points: r.try_get("puntos_totales")?,
            level_label: r.try_get("nivel")?,
            total_minutes: r.try_get("tiempo_total_minutos")?,
        })
    })
    .transpose()
}

pub async fn select_element_usage(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<ElementUsageRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
            e.id_elemento::BIGINT AS id_elemento,
            e.nombre,
            COALESCE(e.simbolo, '')::TEXT AS simbolo,
            COALESCE(se.cantidad, 0)::FLOAT8 AS cantidad
        FROM elemento e
        INNER JOIN simulacion_elemento se ON e.id_elemento = se.elemento_id
        INNER JOIN simulacion s ON se.simulacion_id = s.id_simulacion
        WHERE s.usuario_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| {
            Ok::<_, sqlx::Error>(ElementUsageRow {
                element_id: r.try_get("id_elemento")?,
                element_name: r.try_get("nombre")?,
                symbol: r.try_get("simbolo")?,
                quantity: r.try_get("cantidad")?,
            })
        })
        .collect()
}

/// Must run first inside a transaction.
pub async fn begin_snapshot_read(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn count_simulations(
    conn: &mut PgConnection,
    user_id: i64,
    status_label: Option<&str>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)::BIGINT
        FROM simulacion s
        WHERE s.usuario_id = $1
          AND ($2::TEXT IS NULL OR COALESCE(s.estado, 'Completada') = $2)
        "#,
    )
    .bind(user_id)
    .bind(status_label)
    .fetch_one(&mut *conn)
    .await
}

pub async fn select_simulations(
    conn: &mut PgConnection,
    user_id: i64,
    status_label: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SimulationRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
            s.id_simulacion::BIGINT AS id_simulacion,
            s.nombre,
            s.fecha::TIMESTAMPTZ AS fecha,
            s.descripcion,
            s.estado::TEXT AS estado,
            s.duracion_minutos::BIGINT AS duracion_minutos,
            s.tipo_simulacion::TEXT AS tipo_simulacion,
            COALESCE(s.puntos_obtenidos, 0)::BIGINT AS puntos_obtenidos,
            COUNT(se.elemento_id)::BIGINT AS elementos_usados
        FROM simulacion s
        LEFT JOIN simulacion_elemento se ON s.id_simulacion = se.simulacion_id
        WHERE s.usuario_id = $1
          AND ($2::TEXT IS NULL OR COALESCE(s.estado, 'Completada') = $2)
        GROUP BY s.id_simulacion
        ORDER BY s.fecha DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(status_label)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(map_simulation_row).collect()
}

fn map_simulation_row(r: &PgRow) -> Result<SimulationRow, sqlx::Error> {
    Ok(SimulationRow {
        simulation_id: r.try_get("id_simulacion")?,
        name: r.try_get("nombre")?,
        timestamp: r.try_get("fecha")?,
        description: r.try_get("descripcion")?,
        status: r.try_get("estado")?,
        duration_minutes: r.try_get("duracion_minutos")?,
        simulation_type: r.try_get("tipo_simulacion")?,
        points_earned: r.try_get("puntos_obtenidos")?,
        elements_used: r.try_get("elementos_usados")?,
    })
}

pub async fn select_theory_progress(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<TheoryRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
            t.id_teoria::BIGINT AS id_teoria,
            t.titulo,
            t.categoria::TEXT AS categoria,
            COALESCE(ut.leido, FALSE) AS leido,
            CASE WHEN ut.leido THEN ut.fecha::TIMESTAMPTZ END AS fecha_lectura,
            (
                SELECT COUNT(*)
                FROM teoria_tarea_simulacion tts
                WHERE tts.teoria_id = t.id_teoria
            )::BIGINT AS tareas_totales
        FROM teoria t
        LEFT JOIN usuario_teoria ut
            ON ut.teoria_id = t.id_teoria AND ut.usuario_id = $1
        ORDER BY t.id_teoria
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| {
            Ok::<_, sqlx::Error>(TheoryRow {
                theory_id: r.try_get("id_teoria")?,
                title: r.try_get("titulo")?,
                category: r.try_get("categoria")?,
                read: r.try_get("leido")?,
                read_at: r.try_get("fecha_lectura")?,
                tasks_total: r.try_get("tareas_totales")?,
            })
        })
        .collect()
}

pub async fn select_user_kind(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<UserKind>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT tipo_usuario::TEXT AS tipo_usuario FROM usuario WHERE id_usuario = $1"#)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| {
        let label: Option<String> = r.try_get("tipo_usuario")?;
        Ok::<_, sqlx::Error>(UserKind::from_label(label.as_deref()))
    })
    .transpose()
}

/// Calls the `registrar_progreso` stored function; returns the new record id.
pub async fn insert_progress_event(
    conn: &mut PgConnection,
    event: &NewProgressEvent,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT registrar_progreso($1, $2, $3, $4, $5::jsonb, $6::uuid)::BIGINT AS progreso_id
        "#,
    )
    .bind(event.user_id)
    .bind(&event.action_name)
    .bind(&event.description)
    .bind(event.points)
    .bind(&event.payload)
    .bind(event.session_id)
    .fetch_one(&mut *conn)
    .await
}
